/// Defines the closed-loop control of a single swerve module
pub mod module_controller;

/// Defines the mapping between chassis velocities and module states
pub mod kinematics;

/// Defines the limiting of the commanded motion when the wheels slip
pub mod traction_control;

/// Defines the limiting of the commanded motion when the chassis tips
pub mod anti_tip;

/// Defines the approach of a goal pose
pub mod pose_navigator;

/// Defines the per-tick orchestration of the drive elements
pub mod drive_coordinator;
