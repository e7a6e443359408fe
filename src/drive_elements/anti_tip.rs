//! Defines the compensation that keeps the chassis from tipping over.

use tracing::debug;

use crate::{
    closed_loop::{GainSet, PidController},
    geometry::ChassisVelocity,
    hardware::sensor_interface::TiltEstimate,
    number_space::NumberSpaceType,
    Error,
};

#[cfg(test)]
#[path = "anti_tip_tests.rs"]
mod anti_tip_tests;

/// Adds a corrective velocity towards the low side of the chassis when it tilts too far.
///
/// Below the onset angle the commanded velocity passes through unchanged. Above it a dedicated
/// closed loop works on the tilt beyond the onset angle, so the correction starts from zero at the
/// onset angle and grows with the tilt. The correction drives the chassis towards the side it leans
/// to, which brings the wheels back under the center of mass and brakes any motion away from
/// that side.
pub struct AntiTipController {
    /// The closed loop on the tilt beyond the onset angle.
    compensator: PidController,

    /// The tilt magnitude, in radians, above which the compensation is active.
    onset_angle: f64,

    /// The largest correction, in meters per second, that is applied.
    max_correction: f64,

    /// The correction applied in the last call to [AntiTipController::compensate()].
    last_correction: f64,
}

impl AntiTipController {
    /// Returns the robot-relative velocity with the anti-tip correction applied.
    ///
    /// ## Parameters
    ///
    /// * 'commanded' - The robot-relative velocity to correct
    /// * 'tilt' - The current tilt of the chassis
    /// * 'period_in_seconds' - The time since the previous call
    pub fn compensate(
        &mut self,
        commanded: &ChassisVelocity,
        tilt: &TiltEstimate,
        period_in_seconds: f64,
    ) -> ChassisVelocity {
        let magnitude = tilt.magnitude();
        if !(magnitude > self.onset_angle) {
            self.compensator.reset();
            self.last_correction = 0.0;
            return *commanded;
        }

        let excess = magnitude - self.onset_angle;
        let correction = self
            .compensator
            .calculate(0.0, excess, period_in_seconds)
            .clamp(0.0, self.max_correction);
        self.last_correction = correction;

        debug!(
            pitch = tilt.pitch,
            roll = tilt.roll,
            correction,
            "Compensating for chassis tilt"
        );

        ChassisVelocity::new(
            commanded.vx + correction * tilt.pitch / magnitude,
            commanded.vy + correction * tilt.roll / magnitude,
            commanded.omega,
        )
    }

    /// Returns the correction speed applied in the last call to
    /// [AntiTipController::compensate()].
    pub fn correction(&self) -> f64 {
        self.last_correction
    }

    /// Returns a value indicating whether the last call applied a correction.
    pub fn is_active(&self) -> bool {
        self.last_correction > 0.0
    }

    /// Creates a new [AntiTipController].
    ///
    /// ## Parameters
    ///
    /// * 'gains' - The gains of the compensator
    /// * 'onset_angle' - The tilt magnitude in radians above which the compensation is active
    /// * 'max_correction' - The largest correction speed in meters per second
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when the gains are invalid, or when the onset
    ///   angle or the maximum correction is negative or not finite.
    pub fn new(gains: GainSet, onset_angle: f64, max_correction: f64) -> Result<Self, Error> {
        for (name, value) in [
            ("onset angle", onset_angle),
            ("maximum correction", max_correction),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfiguration {
                    reason: format!(
                        "the anti-tip {} must be a finite, non-negative number. Found {}",
                        name, value
                    ),
                });
            }
        }

        Ok(Self {
            compensator: PidController::new(gains, 0.0, NumberSpaceType::LinearUnlimited)?,
            onset_angle,
            max_correction,
            last_correction: 0.0,
        })
    }

    /// Returns the tilt magnitude above which the compensation is active.
    pub fn onset_angle(&self) -> f64 {
        self.onset_angle
    }
}
