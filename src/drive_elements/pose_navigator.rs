//! Defines the navigation towards a goal pose on the field.

use std::f64::consts::PI;

extern crate nalgebra as na;

use na::Vector2;
use serde::{Deserialize, Serialize};

use crate::{
    closed_loop::{GainSet, PidController},
    events::GoalId,
    geometry::{ChassisVelocity, Pose},
    number_space::{wrap_angle, NumberSpaceType},
    Error,
};

#[cfg(test)]
#[path = "pose_navigator_tests.rs"]
mod pose_navigator_tests;

/// Defines how close the robot has to be to a goal for the goal to be reached.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct GoalTolerance {
    /// The largest distance to the goal position in meters.
    pub position: f64,
    /// The largest difference with the goal heading in radians.
    pub heading: f64,
}

impl GoalTolerance {
    /// Checks that both tolerances are finite and positive.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when either tolerance is not a positive number.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [("position", self.position), ("heading", self.heading)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfiguration {
                    reason: format!(
                        "the goal {} tolerance must be a positive number. Found {}",
                        name, value
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Defines a pose the robot should drive to.
///
/// A goal is active for as long as it is held by the coordinator. Every goal gets its own
/// [GoalId] so that the navigator can tell a new goal from the current one, even when both have
/// the same target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationGoal {
    id: GoalId,
    target: Pose,
    tolerance: GoalTolerance,
}

impl NavigationGoal {
    /// Returns the ID of the goal.
    pub fn id(&self) -> GoalId {
        self.id
    }

    /// Creates a new [NavigationGoal] with a new ID.
    pub fn new(target: Pose, tolerance: GoalTolerance) -> Self {
        Self {
            id: GoalId::new(),
            target,
            tolerance,
        }
    }

    /// Returns the field pose of the goal.
    pub fn target(&self) -> Pose {
        self.target
    }

    /// Returns the tolerance of the goal.
    pub fn tolerance(&self) -> GoalTolerance {
        self.tolerance
    }
}

/// Computes the field-relative velocity that moves the robot towards a goal pose.
///
/// Rather than aiming at the goal directly, the navigator aims at a point at most `lookahead`
/// meters along the straight line to the goal. The translation loop works on the distance to that
/// aim point, which caps the error seen by the loop and gives a smoother approach with less
/// overshoot. The heading is controlled by a separate loop that always turns the short way.
pub struct PoseNavigator {
    /// The closed loop on the distance to the aim point.
    translation: PidController,

    /// The closed loop on the heading.
    heading: PidController,

    /// The largest distance between the robot and the aim point, in meters.
    lookahead: f64,

    /// The largest translational speed, in meters per second.
    max_speed: f64,

    /// The largest rotational speed, in radians per second.
    max_rotation: f64,

    /// The goal the loops were last used for.
    current_goal: GoalId,
}

impl PoseNavigator {
    /// Returns the velocity that moves the robot towards the goal and a value indicating whether
    /// the goal has been reached.
    ///
    /// The velocity is relative to the field. Without a goal, or once the goal is reached, the
    /// velocity is zero. The closed loops are reset whenever the goal changes or is dropped, so
    /// nothing accumulated for one goal carries over to the next.
    ///
    /// ## Parameters
    ///
    /// * 'current' - The current pose of the robot
    /// * 'goal' - The goal to drive to, if any
    /// * 'period_in_seconds' - The time since the previous call
    pub fn advance(
        &mut self,
        current: &Pose,
        goal: Option<&NavigationGoal>,
        period_in_seconds: f64,
    ) -> (ChassisVelocity, bool) {
        let goal = match goal {
            Some(g) => g,
            None => {
                if !self.current_goal.is_none() {
                    self.reset();
                }
                return (ChassisVelocity::zero(), false);
            }
        };

        if goal.id != self.current_goal {
            self.reset();
            self.current_goal = goal.id;
        }

        let error = goal.target.translation() - current.translation();
        let distance = error.norm();
        let heading_error = wrap_angle(goal.target.heading - current.heading);

        // Both errors have to be in tolerance at the same time
        if distance <= goal.tolerance.position && heading_error.abs() <= goal.tolerance.heading {
            self.translation.reset();
            self.heading.reset();
            return (ChassisVelocity::zero(), true);
        }

        let aim = self.aim_point(current, &goal.target);
        let aim_distance = (aim - current.translation()).norm();
        let speed = self
            .translation
            .calculate(0.0, aim_distance, period_in_seconds)
            .clamp(0.0, self.max_speed);

        let direction = if distance > 0.0 {
            error / distance
        } else {
            Vector2::zeros()
        };
        let translation = direction * speed;

        let omega = self
            .heading
            .calculate(current.heading, goal.target.heading, period_in_seconds)
            .clamp(-self.max_rotation, self.max_rotation);

        (
            ChassisVelocity::new(translation.x, translation.y, omega),
            false,
        )
    }

    /// Returns the point the navigator aims at: the goal position when it is within the lookahead
    /// distance, otherwise the point at the lookahead distance along the line to the goal.
    pub fn aim_point(&self, current: &Pose, goal: &Pose) -> Vector2<f64> {
        let start = current.translation();
        let error = goal.translation() - start;
        let distance = error.norm();
        if distance <= self.lookahead {
            goal.translation()
        } else {
            start + error * (self.lookahead / distance)
        }
    }

    /// Returns the ID of the goal the navigator last worked on.
    pub fn current_goal(&self) -> GoalId {
        self.current_goal
    }

    /// Returns the lookahead distance.
    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// Creates a new [PoseNavigator].
    ///
    /// ## Parameters
    ///
    /// * 'translation_gains' - The gains of the loop on the distance to the aim point
    /// * 'heading_gains' - The gains of the heading loop
    /// * 'lookahead' - The largest distance to the aim point in meters
    /// * 'max_speed' - The largest translational speed in meters per second
    /// * 'max_rotation' - The largest rotational speed in radians per second
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when the gains are invalid or any of the
    ///   distances or speeds is not a positive number.
    pub fn new(
        translation_gains: GainSet,
        heading_gains: GainSet,
        lookahead: f64,
        max_speed: f64,
        max_rotation: f64,
    ) -> Result<Self, Error> {
        for (name, value) in [
            ("lookahead", lookahead),
            ("maximum speed", max_speed),
            ("maximum rotation", max_rotation),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfiguration {
                    reason: format!(
                        "the navigation {} must be a positive number. Found {}",
                        name, value
                    ),
                });
            }
        }

        Ok(Self {
            translation: PidController::new(
                translation_gains,
                0.0,
                NumberSpaceType::LinearUnlimited,
            )?,
            heading: PidController::new(
                heading_gains,
                0.0,
                NumberSpaceType::AngularLimited {
                    start_angle_in_radians: -PI,
                },
            )?,
            lookahead,
            max_speed,
            max_rotation,
            current_goal: GoalId::none(),
        })
    }

    /// Clears the state of both loops and forgets the current goal.
    pub fn reset(&mut self) {
        self.translation.reset();
        self.heading.reset();
        self.current_goal = GoalId::none();
    }
}
