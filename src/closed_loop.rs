//! Defines the gains and the discrete closed-loop controller that every control loop in the
//! drivetrain is built from.

use serde::{Deserialize, Serialize};

use crate::{
    number_space::{to_number_space, NumberSpaceType, RealNumberValueSpace},
    Error,
};

#[cfg(test)]
#[path = "closed_loop_tests.rs"]
mod closed_loop_tests;

/// Stores the proportional, integral, derivative and feed-forward gains for a control loop.
///
/// The gains are fixed once the gain set is created. All gains are non-negative.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GainSet {
    /// The proportional gain.
    #[serde(default)]
    kp: f64,

    /// The integral gain.
    #[serde(default)]
    ki: f64,

    /// The derivative gain.
    #[serde(default)]
    kd: f64,

    /// The feed-forward gain, applied to the setpoint.
    #[serde(default)]
    kf: f64,
}

impl GainSet {
    /// Returns the derivative gain.
    pub fn kd(&self) -> f64 {
        self.kd
    }

    /// Returns the feed-forward gain.
    pub fn kf(&self) -> f64 {
        self.kf
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> f64 {
        self.ki
    }

    /// Returns the proportional gain.
    pub fn kp(&self) -> f64 {
        self.kp
    }

    /// Creates a new [GainSet].
    ///
    /// ## Parameters
    ///
    /// * 'kp' - The proportional gain
    /// * 'ki' - The integral gain
    /// * 'kd' - The derivative gain
    /// * 'kf' - The feed-forward gain
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when any of the gains is negative or not a
    ///   finite number.
    ///
    /// ## Examples
    ///
    /// ```
    /// use swerve_drive_core::closed_loop::GainSet;
    ///
    /// assert!(GainSet::new(1.0, 0.0, 0.1, 0.0).is_ok());
    /// assert!(GainSet::new(-1.0, 0.0, 0.0, 0.0).is_err());
    /// ```
    pub fn new(kp: f64, ki: f64, kd: f64, kf: f64) -> Result<Self, Error> {
        let result = Self { kp, ki, kd, kf };
        result.validate()?;
        Ok(result)
    }

    /// Creates a [GainSet] from constant gains that are known to be valid.
    pub(crate) const fn from_constants(kp: f64, ki: f64, kd: f64, kf: f64) -> Self {
        Self { kp, ki, kd, kf }
    }

    /// Checks that all gains are finite and non-negative.
    ///
    /// Gain sets that are read from a configuration file do not pass through [GainSet::new()]
    /// so every controller checks its gains again when it is created.
    pub fn validate(&self) -> Result<(), Error> {
        let named = [
            ("kP", self.kp),
            ("kI", self.ki),
            ("kD", self.kd),
            ("kF", self.kf),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfiguration {
                    reason: format!("gain {} must be a finite, non-negative number. Found {}", name, value),
                });
            }
        }

        Ok(())
    }
}

/// A discrete PID controller with setpoint feed-forward.
///
/// ```text
/// output = kP * e + kI * sum(e * dt) + kD * de/dt + kF * setpoint
/// ```
///
/// The error `e` is the smallest distance from the measurement to the setpoint in the number
/// space of the controller, so an angular controller always corrects the short way around.
///
/// The integral accumulator and the previous error are the only state that survives between
/// calls. Both are cleared by [PidController::reset()].
pub struct PidController {
    /// The gains of the controller.
    gains: GainSet,

    /// The error magnitude at which the controller is considered to be at its setpoint.
    tolerance: f64,

    /// The number space in which the error is calculated.
    number_space: Box<dyn RealNumberValueSpace>,

    /// The accumulated integral of the error over time.
    integral: f64,

    /// The error from the previous calculation. None if there was no previous calculation since
    /// creation or the last reset.
    previous_error: Option<f64>,
}

impl PidController {
    /// Returns a value indicating whether the error of the last calculation was within the
    /// tolerance.
    ///
    /// Returns false if the controller has not calculated an output since it was created or
    /// reset.
    pub fn at_setpoint(&self) -> bool {
        match self.previous_error {
            Some(e) => e.abs() <= self.tolerance,
            None => false,
        }
    }

    /// Calculates the controller output for the given measurement and setpoint.
    ///
    /// ## Parameters
    ///
    /// * 'measurement' - The measured value of the controlled quantity
    /// * 'setpoint' - The desired value of the controlled quantity
    /// * 'period_in_seconds' - The time since the previous calculation. Values that are not
    ///   positive skip the integral and derivative terms.
    pub fn calculate(&mut self, measurement: f64, setpoint: f64, period_in_seconds: f64) -> f64 {
        let error = self
            .number_space
            .smallest_distance_between_values(measurement, setpoint);

        let has_period = period_in_seconds.is_finite() && period_in_seconds > 0.0;

        let derivative = match (self.previous_error, has_period) {
            (Some(previous), true) => (error - previous) / period_in_seconds,
            _ => 0.0,
        };

        if has_period {
            self.integral += error * period_in_seconds;
        }

        self.previous_error = Some(error);

        self.gains.kp * error
            + self.gains.ki * self.integral
            + self.gains.kd * derivative
            + self.gains.kf * setpoint
    }

    /// Returns the gains of the controller.
    pub fn gains(&self) -> &GainSet {
        &self.gains
    }

    /// Returns the error of the last calculation, if any.
    pub fn last_error(&self) -> Option<f64> {
        self.previous_error
    }

    /// Creates a new [PidController].
    ///
    /// ## Parameters
    ///
    /// * 'gains' - The gains for the controller
    /// * 'tolerance' - The error magnitude at which the controller is at its setpoint
    /// * 'number_space' - The number space in which errors are calculated
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when the gains are invalid or the tolerance is
    ///   negative or not finite.
    pub fn new(
        gains: GainSet,
        tolerance: f64,
        number_space: NumberSpaceType,
    ) -> Result<Self, Error> {
        gains.validate()?;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "controller tolerance must be a finite, non-negative number. Found {}",
                    tolerance
                ),
            });
        }

        Ok(Self {
            gains,
            tolerance,
            number_space: to_number_space(number_space),
            integral: 0.0,
            previous_error: None,
        })
    }

    /// Clears the integral accumulator and the previous error.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
    }

    /// Returns the tolerance of the controller.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}
