//! Defines the mapping between the motion of the chassis and the states of the swerve modules.
//!
//! Each module sits at a fixed offset from the chassis center. For a chassis velocity
//! `(vx, vy, omega)` the contact point of module `i` moves with
//!
//! ```text
//! v_i = (vx - omega * y_i, vy + omega * x_i)
//! ```
//!
//! Stacking these equations for all modules gives an 8x3 system `A * [vx, vy, omega] = v`. The
//! inverse kinematics evaluate it directly. The forward kinematics solve it in the least-squares
//! sense with the pseudo-inverse of `A`, which is computed once when the kinematics are created.

extern crate nalgebra as na;

use na::{Matrix3, SMatrix, SVector, Vector2, Vector3};

use crate::{
    geometry::{ChassisVelocity, ModuleId, ModuleState, Pose},
    Error,
};

#[cfg(test)]
#[path = "kinematics_tests.rs"]
mod kinematics_tests;

/// Module speeds below this value, in meters per second, are treated as standing still.
const STANDSTILL_SPEED: f64 = 1e-6;

/// Converts between chassis velocities and module states for a chassis with four modules.
#[derive(Clone, Debug)]
pub struct SwerveKinematics {
    /// The offsets of the modules from the chassis center, indexed by [ModuleId::index()].
    offsets: [Vector2<f64>; 4],

    /// The pseudo-inverse of the module velocity equations.
    forward: SMatrix<f64, 3, 8>,

    /// The largest wheel speed a module can reach.
    max_module_speed: f64,
}

impl SwerveKinematics {
    /// Scales the module speeds down uniformly so that none of them exceeds the given maximum.
    ///
    /// The ratios between the module speeds are preserved, so the chassis keeps moving in the
    /// same direction, just slower.
    pub fn desaturate(states: &mut [ModuleState; 4], max_module_speed: f64) {
        let fastest = states.iter().map(|s| s.speed.abs()).fold(0.0, f64::max);
        if fastest > max_module_speed && fastest > 0.0 {
            let scale = max_module_speed / fastest;
            for state in states.iter_mut() {
                state.speed *= scale;
            }
        }
    }

    /// Returns the largest wheel speed a module can reach.
    pub fn max_module_speed(&self) -> f64 {
        self.max_module_speed
    }

    /// Returns the offset of the given module from the chassis center.
    pub fn module_offset(&self, module: ModuleId) -> Vector2<f64> {
        self.offsets[module.index()]
    }

    /// Creates a new [SwerveKinematics].
    ///
    /// ## Parameters
    ///
    /// * 'offsets' - The offsets of the modules from the chassis center in meters, in the order
    ///   of [ModuleId::ALL]
    /// * 'max_module_speed' - The largest wheel speed a module can reach in meters per second
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when the maximum module speed is not a
    ///   positive number.
    /// * [Error::DegenerateModuleLayout] - Returned when the module offsets do not allow the
    ///   chassis velocity to be recovered, e.g. when all modules sit at the same point.
    pub fn new(offsets: [Vector2<f64>; 4], max_module_speed: f64) -> Result<Self, Error> {
        if !max_module_speed.is_finite() || max_module_speed <= 0.0 {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "the maximum module speed must be a positive number. Found {}",
                    max_module_speed
                ),
            });
        }

        let mut a = SMatrix::<f64, 8, 3>::zeros();
        for (i, offset) in offsets.iter().enumerate() {
            a[(2 * i, 0)] = 1.0;
            a[(2 * i, 2)] = -offset.y;
            a[(2 * i + 1, 1)] = 1.0;
            a[(2 * i + 1, 2)] = offset.x;
        }

        let normal = a.transpose() * a;
        let normal_inverse = normal
            .try_inverse()
            .ok_or(Error::DegenerateModuleLayout)?;

        Ok(Self {
            offsets,
            forward: normal_inverse * a.transpose(),
            max_module_speed,
        })
    }

    /// Returns the chassis velocity that best explains the given module states.
    ///
    /// The velocity is relative to the robot.
    pub fn to_chassis_velocity(&self, states: &[ModuleState; 4]) -> ChassisVelocity {
        let mut module_velocities = SVector::<f64, 8>::zeros();
        for (i, state) in states.iter().enumerate() {
            let v = state.velocity();
            module_velocities[2 * i] = v.x;
            module_velocities[2 * i + 1] = v.y;
        }

        let chassis = self.forward * module_velocities;
        ChassisVelocity::new(chassis[0], chassis[1], chassis[2])
    }

    /// Returns the chassis velocity that best explains the module states that are marked as
    /// measured, ignoring the others.
    ///
    /// Returns `None` when fewer than two modules are measured, as the chassis rotation can't be
    /// recovered from a single module.
    ///
    /// ## Parameters
    ///
    /// * 'states' - The module states
    /// * 'measured' - A flag per module that indicates if its state was measured this tick
    pub fn to_chassis_velocity_from_measured(
        &self,
        states: &[ModuleState; 4],
        measured: &[bool; 4],
    ) -> Option<ChassisVelocity> {
        let count = measured.iter().filter(|m| **m).count();
        if count == measured.len() {
            return Some(self.to_chassis_velocity(states));
        }

        if count < 2 {
            return None;
        }

        let mut normal = Matrix3::<f64>::zeros();
        let mut rhs = Vector3::<f64>::zeros();
        for ((offset, state), _) in self
            .offsets
            .iter()
            .zip(states.iter())
            .zip(measured.iter())
            .filter(|(_, m)| **m)
        {
            let rows = SMatrix::<f64, 2, 3>::new(1.0, 0.0, -offset.y, 0.0, 1.0, offset.x);
            normal += rows.transpose() * rows;
            rhs += rows.transpose() * state.velocity();
        }

        let chassis = normal.try_inverse()? * rhs;
        Some(ChassisVelocity::new(chassis[0], chassis[1], chassis[2]))
    }

    /// Returns the module states that produce the given robot-relative chassis velocity.
    ///
    /// Modules that would stand still keep the angle they had in `previous` so that the wheels
    /// don't snap back to zero when the chassis stops. The resulting speeds are desaturated
    /// against the maximum module speed.
    ///
    /// ## Parameters
    ///
    /// * 'velocity' - The robot-relative chassis velocity
    /// * 'previous' - The module states of the previous tick
    pub fn to_module_states(
        &self,
        velocity: &ChassisVelocity,
        previous: &[ModuleState; 4],
    ) -> [ModuleState; 4] {
        let mut states = [ModuleState::default(); 4];
        for (i, offset) in self.offsets.iter().enumerate() {
            let vx = velocity.vx - velocity.omega * offset.y;
            let vy = velocity.vy + velocity.omega * offset.x;
            let speed = vx.hypot(vy);

            states[i] = if speed < STANDSTILL_SPEED {
                ModuleState::new(0.0, previous[i].angle)
            } else {
                ModuleState::new(speed, vy.atan2(vx))
            };
        }

        Self::desaturate(&mut states, self.max_module_speed);
        states
    }
}

/// Tracks the pose of the robot on the field by integrating the chassis motion.
#[derive(Clone, Copy, Debug, Default)]
pub struct Odometry {
    pose: Pose,
}

impl Odometry {
    /// Creates a new [Odometry] starting at the given pose.
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }

    /// Returns the current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Replaces the pose estimate.
    pub fn reset(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Moves the pose estimate along the given robot-relative chassis velocity for one period.
    pub fn update(&mut self, velocity: &ChassisVelocity, period_in_seconds: f64) -> Pose {
        if period_in_seconds.is_finite() && period_in_seconds > 0.0 {
            self.pose = self.pose.exp(
                velocity.vx * period_in_seconds,
                velocity.vy * period_in_seconds,
                velocity.omega * period_in_seconds,
            );
        }

        self.pose
    }
}
