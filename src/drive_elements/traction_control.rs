//! Defines the limiting of the commanded chassis motion when the wheels lose traction.

use tracing::debug;

use crate::{geometry::ChassisVelocity, Error};

#[cfg(test)]
#[path = "traction_control_tests.rs"]
mod traction_control_tests;

/// The number of slipping modules at which the rotation is limited as well.
const MAJORITY_OF_MODULES: usize = 3;

/// Stores the comparison between the commanded and the measured wheel speed of a module for a
/// single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TractionSample {
    /// The wheel speed magnitude the module was commanded to drive at.
    pub commanded_speed: f64,

    /// The wheel speed magnitude the module reported.
    pub measured_speed: f64,

    /// `(measured - commanded) / commanded`. Zero when the commanded speed is too small to
    /// compare against.
    pub slip_ratio: f64,
}

/// Describes the limiting applied in a single tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TractionStatus {
    /// The factor the translational velocity was multiplied by. 1.0 when there was no slip.
    pub scale: f64,

    /// The number of modules whose slip ratio exceeded the threshold.
    pub slipping_modules: usize,

    /// Set when the rotational velocity was scaled as well.
    pub rotation_limited: bool,
}

impl Default for TractionStatus {
    fn default() -> Self {
        Self {
            scale: 1.0,
            slipping_modules: 0,
            rotation_limited: false,
        }
    }
}

/// Scales the commanded chassis velocity down when one or more wheels slip.
///
/// The whole chassis velocity is scaled, not just the velocity of the slipping module, so that
/// the four modules keep moving in a coordinated way. The scale follows from the worst slip
/// ratio:
///
/// ```text
/// scale = 1 / (1 + max(|slip|) - threshold)
/// ```
///
/// The scale is applied once per tick. The next tick samples the slip again based on the reduced
/// command. The rotation is only scaled when most of the modules slip.
#[derive(Clone, Copy, Debug)]
pub struct TractionController {
    slip_threshold: f64,
    min_expected_speed: f64,
}

impl TractionController {
    /// Returns the velocity limited for the given slip samples, together with a description of
    /// the limiting.
    ///
    /// The returned speed magnitude is never larger than the commanded speed magnitude.
    pub fn limit(
        &self,
        commanded: &ChassisVelocity,
        samples: &[TractionSample; 4],
    ) -> (ChassisVelocity, TractionStatus) {
        let slipping_modules = samples
            .iter()
            .filter(|s| s.slip_ratio.abs() > self.slip_threshold)
            .count();

        if slipping_modules == 0 {
            return (*commanded, TractionStatus::default());
        }

        let worst = samples
            .iter()
            .map(|s| s.slip_ratio.abs())
            .fold(0.0, f64::max);
        let scale = 1.0 / (1.0 + worst - self.slip_threshold);

        let rotation_limited = slipping_modules >= MAJORITY_OF_MODULES;
        let rotation_scale = if rotation_limited { scale } else { 1.0 };

        debug!(
            slip = worst,
            scale,
            slipping_modules,
            rotation_limited,
            "Limiting the chassis velocity for wheel slip"
        );

        (
            commanded.scaled(scale, rotation_scale),
            TractionStatus {
                scale,
                slipping_modules,
                rotation_limited,
            },
        )
    }

    /// Creates a new [TractionController].
    ///
    /// ## Parameters
    ///
    /// * 'slip_threshold' - The slip ratio magnitude above which the velocity is limited
    /// * 'min_expected_speed' - The commanded wheel speed in meters per second below which the
    ///   slip ratio is taken to be zero
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when either value is negative or not finite.
    pub fn new(slip_threshold: f64, min_expected_speed: f64) -> Result<Self, Error> {
        for (name, value) in [
            ("slip threshold", slip_threshold),
            ("minimum expected speed", min_expected_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfiguration {
                    reason: format!(
                        "the traction {} must be a finite, non-negative number. Found {}",
                        name, value
                    ),
                });
            }
        }

        Ok(Self {
            slip_threshold,
            min_expected_speed,
        })
    }

    /// Compares the commanded and measured wheel speed of a module.
    ///
    /// ## Parameters
    ///
    /// * 'commanded_speed' - The wheel speed the module was commanded to drive at in the previous
    ///   tick
    /// * 'measured_speed' - The wheel speed the module reports now
    pub fn sample(&self, commanded_speed: f64, measured_speed: f64) -> TractionSample {
        let expected = commanded_speed.abs();
        let measured = measured_speed.abs();

        let slip_ratio = if expected < self.min_expected_speed || expected == 0.0 {
            0.0
        } else {
            (measured - expected) / expected
        };

        TractionSample {
            commanded_speed: expected,
            measured_speed: measured,
            slip_ratio,
        }
    }

    /// Returns the slip ratio magnitude above which the velocity is limited.
    pub fn slip_threshold(&self) -> f64 {
        self.slip_threshold
    }
}
