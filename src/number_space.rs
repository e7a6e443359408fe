//! Defines different a way to describe a space of numbers and how these spaces behave at the
//! boundaries.
//!
//! A linear unbounded space has boundaries at +infinity and -infinity. This type of space does
//! not wrap around, i.e. the only way to get from the lower boundary to the upper boundary is to
//! pass through all the numbers between the boundaries.
//! A periodic number space has lower and upper boundaries at specific non-infinity numbers and
//! wraps around. Wheel angles and robot headings live in such a space, which is why a wheel at
//! -179 degrees is only 2 degrees away from a wheel at 179 degrees.
//!
//! Three spaces are available through [to_number_space()]:
//! * [NumberSpaceType::LinearUnlimited] for speeds and distances.
//! * [NumberSpaceType::AngularLimited] for headings and steering angles, a full turn in size.
//! * [NumberSpaceType::HalfTurn] for steering angles of a wheel that may reverse its drive
//!   direction, half a turn in size.

use std::f64::consts::PI;

#[cfg(test)]
#[path = "number_space_tests.rs"]
mod number_space_tests;

/// Defines the different kinds of number spaces available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberSpaceType {
    /// Indicates that a number space is a linear number space where numbers sequentially
    /// increase from -infinity to +infinity.
    LinearUnlimited,

    /// Indicates that a number space is an angular number space where numbers sequentially
    /// increase from the start angle to the start angle + 2 PI.
    AngularLimited {
        /// The starting angle in radians
        start_angle_in_radians: f64,
    },

    /// Indicates that a number space is an angular number space where numbers sequentially
    /// increase from -PI / 2 to PI / 2. Angles half a turn apart are the same value.
    HalfTurn,
}

/// Defines an abstraction over number spaces
pub trait RealNumberValueSpace: Send + Sync {
    /// Returns the value in the space that is equivalent to the given value
    ///
    /// ## Parameters
    ///
    /// * `value` - The value that should be normalized.
    ///
    /// ## Example
    ///
    /// ```
    /// use core::f64::consts::PI;
    /// use swerve_drive_core::number_space::{ NumberSpaceType, to_number_space };
    ///
    /// let space = to_number_space(NumberSpaceType::AngularLimited { start_angle_in_radians: -PI });
    /// let value = space.normalize_value(1.5 * PI);
    /// assert!((value + 0.5 * PI).abs() < 1e-12);
    /// ```
    fn normalize_value(&self, value: f64) -> f64;

    /// Returns the signed distance from `start` to `end` that has the smallest magnitude.
    ///
    /// For unlimited number spaces this is the plain difference. For a periodic number space
    /// the distance across a boundary may be shorter.
    ///
    /// ## Parameters
    ///
    /// * `start` - The starting value.
    /// * `end` - The ending value
    ///
    /// ## Example
    ///
    /// ```
    /// use core::f64::consts::PI;
    /// use swerve_drive_core::number_space::{ NumberSpaceType, to_number_space };
    ///
    /// let space = to_number_space(NumberSpaceType::LinearUnlimited);
    /// assert_eq!(1.0, space.smallest_distance_between_values(1.0, 2.0));
    ///
    /// let space = to_number_space(NumberSpaceType::AngularLimited { start_angle_in_radians: -PI });
    /// let value = space.smallest_distance_between_values(0.0, 1.5 * PI);
    /// assert!((value + 0.5 * PI).abs() < 1e-12);
    /// ```
    fn smallest_distance_between_values(&self, start: f64, end: f64) -> f64;
}

/// Defines a linear unbounded number space with no boundaries
///
/// The linear unbounded number space is what we normally think of as a set
/// of numbers, ranging from -infinity to +infinity.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LinearUnboundedSpace {}

impl LinearUnboundedSpace {
    pub fn new() -> LinearUnboundedSpace {
        LinearUnboundedSpace {}
    }
}

impl RealNumberValueSpace for LinearUnboundedSpace {
    fn normalize_value(&self, value: f64) -> f64 {
        value
    }

    fn smallest_distance_between_values(&self, start: f64, end: f64) -> f64 {
        end - start
    }
}

/// Defines a periodic number space that wraps around at the period.
///
/// Values are kept in [range_start, range_start + range_size).
#[derive(Clone, Copy, Debug)]
pub(crate) struct PeriodicBoundedCircularSpace {
    range_start_in_radians: f64,
    range_size: f64,
}

impl PeriodicBoundedCircularSpace {
    pub fn new_with_two_pi_range(start_angle_in_radians: f64) -> PeriodicBoundedCircularSpace {
        PeriodicBoundedCircularSpace {
            range_start_in_radians: start_angle_in_radians,
            range_size: 2.0 * PI,
        }
    }

    pub fn new_with_half_turn_range() -> PeriodicBoundedCircularSpace {
        PeriodicBoundedCircularSpace {
            range_start_in_radians: -0.5 * PI,
            range_size: PI,
        }
    }
}

impl RealNumberValueSpace for PeriodicBoundedCircularSpace {
    fn normalize_value(&self, value: f64) -> f64 {
        let offset = (value - self.range_start_in_radians).rem_euclid(self.range_size);

        // rem_euclid can round up to the range size for tiny negative offsets
        if offset >= self.range_size {
            self.range_start_in_radians
        } else {
            self.range_start_in_radians + offset
        }
    }

    fn smallest_distance_between_values(&self, start: f64, end: f64) -> f64 {
        let diff = (end - start).rem_euclid(self.range_size);
        if diff > 0.5 * self.range_size {
            diff - self.range_size
        } else {
            diff
        }
    }
}

/// Returns a [RealNumberValueSpace] instance for the given number space type.
///
/// ```
/// use core::f64::consts::PI;
/// use swerve_drive_core::number_space::{ NumberSpaceType, to_number_space };
///
/// // Create a linear space
/// let space = to_number_space(NumberSpaceType::LinearUnlimited);
/// assert_eq!(1.0, space.smallest_distance_between_values(1.0, 2.0));
///
/// // Create a periodic space where opposite angles are the same value
/// let space = to_number_space(NumberSpaceType::HalfTurn);
/// assert!(space.smallest_distance_between_values(0.0, PI).abs() < 1e-12);
/// ```
pub fn to_number_space(number_space_type: NumberSpaceType) -> Box<dyn RealNumberValueSpace> {
    match number_space_type {
        NumberSpaceType::LinearUnlimited => Box::new(LinearUnboundedSpace::new()),
        NumberSpaceType::AngularLimited {
            start_angle_in_radians,
        } => Box::new(PeriodicBoundedCircularSpace::new_with_two_pi_range(
            start_angle_in_radians,
        )),
        NumberSpaceType::HalfTurn => {
            Box::new(PeriodicBoundedCircularSpace::new_with_half_turn_range())
        }
    }
}

/// Wraps an angle in radians into [-PI, PI).
pub fn wrap_angle(angle_in_radians: f64) -> f64 {
    PeriodicBoundedCircularSpace::new_with_two_pi_range(-PI).normalize_value(angle_in_radians)
}
