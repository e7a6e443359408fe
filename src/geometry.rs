//! Defines the planar poses, chassis velocities and module states that flow between the drive
//! elements.
//!
//! The robot frame has the x-axis pointing forward and the y-axis pointing to the left of the
//! robot. Angles are in radians and increase counter-clockwise when seen from above.

use std::fmt::Display;

extern crate nalgebra as na;

use na::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::number_space::wrap_angle;

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod geometry_tests;

/// Identifies one of the four swerve modules.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ModuleId {
    /// The module at the front left corner of the chassis.
    FrontLeft,
    /// The module at the front right corner of the chassis.
    FrontRight,
    /// The module at the rear left corner of the chassis.
    RearLeft,
    /// The module at the rear right corner of the chassis.
    RearRight,
}

impl ModuleId {
    /// All module IDs in the order in which per-module arrays are stored.
    pub const ALL: [ModuleId; 4] = [
        ModuleId::FrontLeft,
        ModuleId::FrontRight,
        ModuleId::RearLeft,
        ModuleId::RearRight,
    ];

    /// Returns the index of the module in per-module arrays.
    pub fn index(&self) -> usize {
        match self {
            ModuleId::FrontLeft => 0,
            ModuleId::FrontRight => 1,
            ModuleId::RearLeft => 2,
            ModuleId::RearRight => 3,
        }
    }

    /// Returns the name used for the module in telemetry keys.
    pub fn name(&self) -> &'static str {
        match self {
            ModuleId::FrontLeft => "FrontLeft",
            ModuleId::FrontRight => "FrontRight",
            ModuleId::RearLeft => "RearLeft",
            ModuleId::RearRight => "RearRight",
        }
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Defines a position and heading on the field.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Pose {
    /// The x-coordinate in meters.
    pub x: f64,
    /// The y-coordinate in meters.
    pub y: f64,
    /// The heading in radians, in [-PI, PI).
    pub heading: f64,
}

impl Pose {
    /// Creates a new [Pose]. The heading is wrapped into [-PI, PI).
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: wrap_angle(heading),
        }
    }

    /// Returns the origin pose, facing along the field x-axis.
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Returns the position of the pose as a vector.
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Returns the pose that results from moving along the given robot-relative twist.
    ///
    /// The twist is integrated over the exponential map of SE(2), so a constant chassis
    /// velocity traces the exact arc rather than a chain of straight segments.
    ///
    /// ## Parameters
    ///
    /// * 'dx' - The forward distance travelled in the robot frame
    /// * 'dy' - The leftward distance travelled in the robot frame
    /// * 'dtheta' - The change of heading
    pub fn exp(&self, dx: f64, dy: f64, dtheta: f64) -> Pose {
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
        };

        let local = Vector2::new(dx * s - dy * c, dx * c + dy * s);
        let field = Rotation2::new(self.heading) * local;

        Pose::new(self.x + field.x, self.y + field.y, self.heading + dtheta)
    }
}

/// Defines a planar velocity of the chassis.
///
/// Whether the velocity is relative to the robot or to the field depends on where it is used.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChassisVelocity {
    /// The velocity along the x-axis in meters per second.
    pub vx: f64,
    /// The velocity along the y-axis in meters per second.
    pub vy: f64,
    /// The rotational velocity in radians per second.
    pub omega: f64,
}

impl ChassisVelocity {
    /// Creates a new [ChassisVelocity].
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    /// Returns a velocity that doesn't move the chassis.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns the magnitude of the translational velocity.
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Returns the translational part of the velocity as a vector.
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }

    /// Converts a field-relative velocity into a robot-relative one for a robot with the given
    /// heading.
    pub fn field_to_robot(&self, heading: f64) -> Self {
        let robot = Rotation2::new(-heading) * self.translation();
        Self::new(robot.x, robot.y, self.omega)
    }

    /// Converts a robot-relative velocity into a field-relative one for a robot with the given
    /// heading.
    pub fn robot_to_field(&self, heading: f64) -> Self {
        let field = Rotation2::new(heading) * self.translation();
        Self::new(field.x, field.y, self.omega)
    }

    /// Returns the velocity with the translational part multiplied by `translation_scale` and
    /// the rotational part multiplied by `rotation_scale`.
    pub fn scaled(&self, translation_scale: f64, rotation_scale: f64) -> Self {
        Self::new(
            self.vx * translation_scale,
            self.vy * translation_scale,
            self.omega * rotation_scale,
        )
    }
}

/// Defines the linear speed and steering angle of a single swerve module.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleState {
    /// The linear speed of the wheel in meters per second. Negative values drive the wheel
    /// backwards.
    pub speed: f64,
    /// The steering angle of the wheel in radians, relative to the robot x-axis.
    pub angle: f64,
}

impl ModuleState {
    /// Creates a new [ModuleState].
    pub fn new(speed: f64, angle: f64) -> Self {
        Self { speed, angle }
    }

    /// Returns the velocity of the wheel contact point as a robot-relative vector.
    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.speed * self.angle.cos(), self.speed * self.angle.sin())
    }
}
