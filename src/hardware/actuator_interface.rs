//! Defines the interface for the actuators that drive and steer the swerve modules.
//!
//! The motor controllers run their own closed loops at or above the tick rate of the control
//! core. The core only writes setpoints and reads back the most recent cached feedback. None of
//! the calls may block.

use std::sync::{Arc, Mutex};

use crate::{geometry::ModuleId, Error};

#[cfg(test)]
#[path = "actuator_interface_tests.rs"]
mod actuator_interface_tests;

/// Describes what kind of hardware backs an [ActuatorInterface].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActuatorKind {
    /// The actuator is a software model of the modules.
    Simulated,
    /// The actuator drives physical motor controllers.
    Physical,
}

/// Defines the interface for the hardware that moves the swerve modules.
///
/// Every [crate::drive_elements::module_controller::ModuleController] talks to the hardware
/// through this interface, so the module logic is identical for simulated and physical
/// drivetrains.
pub trait ActuatorInterface: Send {
    /// Returns the kind of hardware behind the interface.
    fn kind(&self) -> ActuatorKind;

    /// Returns the most recent steering angle of the module in radians.
    ///
    /// ## Errors
    ///
    /// * [Error::StaleFeedback] - Returned when the feedback did not update within the expected
    ///   window.
    fn position_feedback(&self, module: ModuleId) -> Result<f64, Error>;

    /// Sets the steering angle, in radians, that the module should move to.
    fn set_position_setpoint(&mut self, module: ModuleId, angle: f64);

    /// Sets the linear wheel speed, in meters per second, that the module should drive at.
    fn set_velocity_setpoint(&mut self, module: ModuleId, speed: f64);

    /// Returns the most recent linear wheel speed of the module in meters per second.
    ///
    /// ## Errors
    ///
    /// * [Error::StaleFeedback] - Returned when the feedback did not update within the expected
    ///   window.
    fn velocity_feedback(&self, module: ModuleId) -> Result<f64, Error>;
}

/// The state of a single simulated module.
#[derive(Clone, Copy, Debug, Default)]
struct SimulatedModule {
    /// The last velocity setpoint.
    velocity_setpoint: f64,

    /// The last position setpoint.
    position_setpoint: f64,

    /// The ratio by which the measured wheel speed exceeds the setpoint, e.g. 0.2 for a wheel
    /// that spins 20% faster than commanded.
    slip_ratio: f64,

    /// Set when the module stops reporting feedback.
    feedback_lost: bool,
}

/// An [ActuatorInterface] that models ideal modules.
///
/// Each module reaches its setpoints within one tick. The wheel speed can be made to slip by a
/// fixed ratio and the feedback of a module can be switched off to test degraded operation.
///
/// Clones share the same modules, so a test can keep a clone to inspect and disturb the
/// modules after handing the actuator to the drivetrain.
#[derive(Clone, Debug, Default)]
pub struct SimulatedActuator {
    modules: Arc<Mutex<[SimulatedModule; 4]>>,
}

impl SimulatedActuator {
    /// Creates a new [SimulatedActuator] with all modules at rest, pointing forward.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last position setpoint that was sent to the module.
    pub fn position_setpoint(&self, module: ModuleId) -> f64 {
        self.with_module(module, |m| m.position_setpoint)
    }

    /// Enables or disables the feedback of the module.
    pub fn set_feedback_available(&self, module: ModuleId, available: bool) {
        self.with_module(module, |m| m.feedback_lost = !available);
    }

    /// Sets the ratio by which the measured speed of the module exceeds its setpoint.
    pub fn set_slip_ratio(&self, module: ModuleId, slip_ratio: f64) {
        self.with_module(module, |m| m.slip_ratio = slip_ratio);
    }

    /// Returns the last velocity setpoint that was sent to the module.
    pub fn velocity_setpoint(&self, module: ModuleId) -> f64 {
        self.with_module(module, |m| m.velocity_setpoint)
    }

    fn with_module<T>(&self, module: ModuleId, f: impl FnOnce(&mut SimulatedModule) -> T) -> T {
        let mut guard = self.modules.lock().unwrap_or_else(|err| err.into_inner());
        f(&mut guard[module.index()])
    }
}

impl ActuatorInterface for SimulatedActuator {
    fn kind(&self) -> ActuatorKind {
        ActuatorKind::Simulated
    }

    fn position_feedback(&self, module: ModuleId) -> Result<f64, Error> {
        self.with_module(module, |m| {
            if m.feedback_lost {
                Err(Error::StaleFeedback { module })
            } else {
                Ok(m.position_setpoint)
            }
        })
    }

    fn set_position_setpoint(&mut self, module: ModuleId, angle: f64) {
        self.with_module(module, |m| m.position_setpoint = angle);
    }

    fn set_velocity_setpoint(&mut self, module: ModuleId, speed: f64) {
        self.with_module(module, |m| m.velocity_setpoint = speed);
    }

    fn velocity_feedback(&self, module: ModuleId) -> Result<f64, Error> {
        self.with_module(module, |m| {
            if m.feedback_lost {
                Err(Error::StaleFeedback { module })
            } else {
                Ok(m.velocity_setpoint * (1.0 + m.slip_ratio))
            }
        })
    }
}
