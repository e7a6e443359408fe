/// Defines the interface for the drive and steering actuators of the swerve modules
pub mod actuator_interface;

/// Defines the interface for the chassis tilt sensor
pub mod sensor_interface;
