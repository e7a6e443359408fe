//! Defines the object that owns the complete drivetrain.

use tracing::info;

use crate::{
    config::DriveConfig,
    drive_elements::drive_coordinator::{DriveCoordinator, OperatorInput, TickReport},
    events::{command_channel, Button, ButtonBindings, ButtonEdge},
    hardware::{actuator_interface::ActuatorInterface, sensor_interface::TiltSensor},
    telemetry::TelemetrySink,
    Error,
};

#[cfg(test)]
#[path = "robot_tests.rs"]
mod robot_tests;

/// Owns the drivetrain and the button bindings that control it.
///
/// The caller drives the robot from its own scheduler: button edges are passed to
/// [SwerveRobot::button_event()] as they happen and [SwerveRobot::periodic()] is called once per
/// control period. Commands issued by buttons are queued and take effect at the start of the next
/// period.
pub struct SwerveRobot {
    config: DriveConfig,
    coordinator: DriveCoordinator,
    buttons: ButtonBindings,
}

impl SwerveRobot {
    /// Forwards a button edge to the binding table.
    ///
    /// Returns the number of commands that were queued.
    ///
    /// ## Errors
    ///
    /// * [Error::CommandQueueDisconnected] - Returned when the command channel is closed.
    pub fn button_event(&mut self, button: Button, edge: ButtonEdge) -> Result<usize, Error> {
        self.buttons.handle(button, edge)
    }

    /// Returns the configuration the robot was built from.
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Returns the drivetrain.
    pub fn coordinator(&self) -> &DriveCoordinator {
        &self.coordinator
    }

    /// Creates a new [SwerveRobot].
    ///
    /// ## Parameters
    ///
    /// * 'config' - The configuration of the drivetrain
    /// * 'actuator' - The hardware that moves the modules
    /// * 'tilt_sensor' - The hardware that senses the chassis tilt
    /// * 'telemetry' - The output for the telemetry
    ///
    /// ## Errors
    ///
    /// * Any error returned by [DriveConfig::validate()].
    pub fn new(
        config: DriveConfig,
        actuator: Box<dyn ActuatorInterface>,
        tilt_sensor: Box<dyn TiltSensor>,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Result<Self, Error> {
        let actuator_kind = actuator.kind();
        let (sender, receiver) = command_channel();
        let coordinator = DriveCoordinator::new(&config, actuator, tilt_sensor, telemetry, receiver)?;
        let buttons = ButtonBindings::new(config.bindings(), sender);

        info!(
            actuator = ?actuator_kind,
            loop_period = config.loop_period,
            bindings = buttons.bindings().len(),
            "Swerve robot created"
        );

        Ok(Self {
            config,
            coordinator,
            buttons,
        })
    }

    /// Runs one control period with the configured period length.
    pub fn periodic(&mut self, input: &OperatorInput) -> TickReport {
        self.coordinator.tick(input, self.config.loop_period)
    }
}
