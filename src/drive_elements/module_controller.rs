//! Defines the closed-loop control of a single swerve module.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    closed_loop::{GainSet, PidController},
    geometry::{ModuleId, ModuleState},
    hardware::actuator_interface::ActuatorInterface,
    number_space::{to_number_space, NumberSpaceType},
    Error,
};

#[cfg(test)]
#[path = "module_controller_tests.rs"]
mod module_controller_tests;

/// Defines the range of steering angles a module may move through.
///
/// The angles are continuous, i.e. they are not wrapped, so a window of [-1.5 PI, 1.5 PI] allows
/// a module to turn one and a half turns in total.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SoftLimits {
    /// The smallest allowed steering angle in radians.
    pub lower: f64,
    /// The largest allowed steering angle in radians.
    pub upper: f64,
    /// Whether the limits are applied.
    pub enabled: bool,
}

impl SoftLimits {
    fn contains(&self, angle: f64) -> bool {
        angle >= self.lower && angle <= self.upper
    }
}

/// Defines the configuration of one closed loop of a module.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// The gains for the loop.
    pub gains: GainSet,

    /// Set when the feedback sensor counts in the opposite direction of the actuator.
    pub sensor_phase: bool,

    /// Set when the actuator, and the sensor attached to it, are mounted in reverse.
    pub inverted: bool,

    /// The error at which the loop is considered to be at its target.
    pub tolerance: f64,

    /// The angle limits for a steering loop. Ignored for drive loops.
    pub soft_limits: Option<SoftLimits>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            gains: GainSet::default(),
            sensor_phase: false,
            inverted: false,
            tolerance: 0.01,
            soft_limits: None,
        }
    }
}

impl ModuleConfig {
    fn feedback_sign(&self) -> f64 {
        if self.sensor_phase != self.inverted {
            -1.0
        } else {
            1.0
        }
    }

    fn output_sign(&self) -> f64 {
        if self.inverted {
            -1.0
        } else {
            1.0
        }
    }

    /// Checks the gains, the tolerance and the soft limits.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when a gain is negative, the tolerance is
    ///   negative or the enabled soft limits do not describe a window.
    pub fn validate(&self) -> Result<(), Error> {
        self.gains.validate()?;

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "module tolerance must be a finite, non-negative number. Found {}",
                    self.tolerance
                ),
            });
        }

        if let Some(limits) = self.soft_limits {
            if limits.enabled && !(limits.lower < limits.upper) {
                return Err(Error::InvalidConfiguration {
                    reason: format!(
                        "soft limit lower bound {} must be below the upper bound {}",
                        limits.lower, limits.upper
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Describes what happened to the most recent target of a module.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetOutcome {
    /// The target can be reached within the soft limits.
    Accepted,
    /// The target cannot be reached within the soft limits. The module holds the nearest limit
    /// and does not drive.
    HeldAtLimit,
}

/// Controls the wheel speed and steering angle of a single swerve module.
///
/// The module runs a velocity loop for the drive actuator and an angle loop for the steering
/// actuator. Targets are optimized before they are applied: a wheel that would have to turn more
/// than a quarter turn is turned the other way and driven in reverse instead, which gives the same
/// wheel motion with less steering travel.
pub struct ModuleController {
    /// The module this controller belongs to.
    id: ModuleId,

    /// The configuration of the drive loop.
    drive_config: ModuleConfig,

    /// The configuration of the steering loop.
    steer_config: ModuleConfig,

    /// The closed loop for the wheel speed.
    velocity_loop: PidController,

    /// The closed loop for the steering angle. Works on continuous angles because the shortest
    /// path has already been chosen when the target was set.
    angle_loop: PidController,

    /// The optimized target.
    target: ModuleState,

    /// The wheel speed demand that was last sent to the actuator.
    commanded_speed: f64,

    /// The outcome of the last call to [ModuleController::set_target()].
    outcome: TargetOutcome,

    /// The last known state of the module.
    measured: ModuleState,

    /// The number of consecutive ticks without fresh feedback.
    stale_ticks: u32,

    /// The number of ticks without fresh feedback after which the module is degraded.
    stale_limit: u32,
}

impl ModuleController {
    /// Sends the closed-loop outputs for the current target to the actuator.
    ///
    /// ## Parameters
    ///
    /// * 'actuator' - The hardware interface of the modules
    /// * 'period_in_seconds' - The time since the previous call
    pub fn apply(&mut self, actuator: &mut dyn ActuatorInterface, period_in_seconds: f64) {
        let drive_demand =
            self.velocity_loop
                .calculate(self.measured.speed, self.target.speed, period_in_seconds);

        let angle_correction =
            self.angle_loop
                .calculate(self.measured.angle, self.target.angle, period_in_seconds);
        let angle_demand = self.measured.angle + angle_correction;

        self.commanded_speed = drive_demand;
        actuator.set_velocity_setpoint(self.id, drive_demand * self.drive_config.output_sign());
        actuator.set_position_setpoint(self.id, angle_demand * self.steer_config.output_sign());
    }

    /// Returns the remaining steering travel to the target angle in radians.
    pub fn angle_error(&self) -> f64 {
        self.target.angle - self.measured.angle
    }

    /// Returns a value indicating whether both the wheel speed and the steering angle were within
    /// tolerance at the last call to [ModuleController::apply()].
    pub fn at_target(&self) -> bool {
        self.velocity_loop.at_setpoint() && self.angle_loop.at_setpoint()
    }

    /// Returns the wheel speed demand that was last sent to the actuator.
    ///
    /// This is what the measured wheel speed should follow, so it is the reference for the slip
    /// of the module.
    pub fn commanded_speed(&self) -> f64 {
        self.commanded_speed
    }

    /// Returns a value indicating whether the last call to
    /// [ModuleController::refresh_feedback()] received fresh feedback.
    pub fn has_fresh_feedback(&self) -> bool {
        self.stale_ticks == 0
    }

    /// Returns the ID of the module.
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Returns a value indicating whether the feedback of the module has been stale for longer
    /// than the allowed window.
    pub fn is_degraded(&self) -> bool {
        self.stale_ticks >= self.stale_limit
    }

    /// Creates a new [ModuleController].
    ///
    /// ## Parameters
    ///
    /// * 'id' - The module to control
    /// * 'drive_config' - The configuration of the wheel speed loop
    /// * 'steer_config' - The configuration of the steering angle loop
    /// * 'stale_feedback_ticks' - The number of ticks without fresh feedback after which the
    ///   module is reported as degraded. At least 1.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when either configuration is invalid or the
    ///   stale feedback window is zero.
    pub fn new(
        id: ModuleId,
        drive_config: ModuleConfig,
        steer_config: ModuleConfig,
        stale_feedback_ticks: u32,
    ) -> Result<Self, Error> {
        drive_config.validate()?;
        steer_config.validate()?;

        if stale_feedback_ticks == 0 {
            return Err(Error::InvalidConfiguration {
                reason: "the stale feedback window must be at least 1 tick".to_string(),
            });
        }

        let velocity_loop = PidController::new(
            drive_config.gains,
            drive_config.tolerance,
            NumberSpaceType::LinearUnlimited,
        )?;
        let angle_loop = PidController::new(
            steer_config.gains,
            steer_config.tolerance,
            NumberSpaceType::LinearUnlimited,
        )?;

        Ok(Self {
            id,
            drive_config,
            steer_config,
            velocity_loop,
            angle_loop,
            target: ModuleState::default(),
            commanded_speed: 0.0,
            outcome: TargetOutcome::Accepted,
            measured: ModuleState::default(),
            stale_ticks: 0,
            stale_limit: stale_feedback_ticks,
        })
    }

    /// Returns the outcome of the most recent target.
    pub fn outcome(&self) -> TargetOutcome {
        self.outcome
    }

    /// Reads the latest feedback from the actuator.
    ///
    /// When the actuator has no fresh feedback the last known state is kept.
    pub fn refresh_feedback(&mut self, actuator: &dyn ActuatorInterface) {
        let velocity = actuator.velocity_feedback(self.id);
        let position = actuator.position_feedback(self.id);
        match (velocity, position) {
            (Ok(v), Ok(p)) => {
                self.measured = ModuleState::new(
                    v * self.drive_config.feedback_sign(),
                    p * self.steer_config.feedback_sign(),
                );
                self.stale_ticks = 0;
            }
            (Err(e), _) | (_, Err(e)) => {
                self.stale_ticks = self.stale_ticks.saturating_add(1);
                if self.stale_ticks == self.stale_limit {
                    warn!(module = %self.id, error = %e, "Module feedback is stale. Holding the last known state");
                }
            }
        }
    }

    /// Clears the accumulated state of both loops.
    pub fn reset(&mut self) {
        self.velocity_loop.reset();
        self.angle_loop.reset();
    }

    /// Sets the wheel speed and steering angle the module should move to.
    ///
    /// The angle is compared with the current steering angle in the half-turn space, so the module
    /// never steers more than a quarter turn. When the nearest equivalent angle points the wheel
    /// the opposite way the wheel is reversed.
    ///
    /// With soft limits enabled the module picks the equivalent angle inside the limit window that
    /// needs the least travel. If no equivalent angle lies inside the window the request is
    /// rejected: the module holds the limit nearest to the requested angle and stops the wheel.
    ///
    /// ## Parameters
    ///
    /// * 'speed' - The linear wheel speed in meters per second
    /// * 'angle' - The steering angle in radians
    pub fn set_target(&mut self, speed: f64, angle: f64) -> TargetOutcome {
        let current = self.measured.angle;
        let full_turn = to_number_space(NumberSpaceType::AngularLimited {
            start_angle_in_radians: -PI,
        });
        let half_turn = to_number_space(NumberSpaceType::HalfTurn);

        // The two travels differ by half a turn when the wheel has to be reversed
        let travel = half_turn.smallest_distance_between_values(current, angle);
        let full_travel = full_turn.smallest_distance_between_values(current, angle);
        let speed = if (full_travel - travel).abs() > 0.5 * PI {
            -speed
        } else {
            speed
        };
        let candidate = current + travel;

        let limits = match self.steer_config.soft_limits {
            Some(l) if l.enabled => l,
            _ => {
                self.target = ModuleState::new(speed, candidate);
                self.outcome = TargetOutcome::Accepted;
                return self.outcome;
            }
        };

        // Every half turn away from the candidate points the wheel along the same line, with the
        // drive direction flipping each time.
        let within_window = (-3..=3)
            .map(|k: i32| {
                let direction = if k % 2 == 0 { 1.0 } else { -1.0 };
                (candidate + k as f64 * PI, speed * direction)
            })
            .filter(|(a, _)| limits.contains(*a))
            .min_by(|(a, _), (b, _)| (a - current).abs().total_cmp(&(b - current).abs()));

        match within_window {
            Some((a, s)) => {
                self.target = ModuleState::new(s, a);
                self.outcome = TargetOutcome::Accepted;
            }
            None => {
                let held = candidate.clamp(limits.lower, limits.upper);
                if self.outcome != TargetOutcome::HeldAtLimit {
                    warn!(module = %self.id, requested = angle, held, "Steering target is outside the soft limits");
                }

                self.target = ModuleState::new(0.0, held);
                self.outcome = TargetOutcome::HeldAtLimit;
            }
        }

        self.outcome
    }

    /// Returns the last known state of the module.
    pub fn state(&self) -> ModuleState {
        self.measured
    }

    /// Returns the optimized target of the module.
    pub fn target(&self) -> ModuleState {
        self.target
    }
}
