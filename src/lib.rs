#![warn(missing_docs)]

//! Control core for a swerve (4 wheel steering and 4 wheel drive) robot drivetrain.
//!
//! Turns operator stick input and navigation goals into per-module velocity and
//! steering commands once per fixed control period, while limiting the commanded
//! motion when the wheels slip or the chassis starts to tip.

use thiserror::Error;

use crate::geometry::ModuleId;

/// Defines different number spaces
pub mod number_space;

/// Provides the discrete closed-loop controller and its gains
pub mod closed_loop;

/// Provides the poses, velocities and module states shared by the drive elements
pub mod geometry;

/// Provides the non-linear shaping of operator stick input
pub mod input_shaping;

/// Provides the interfaces to the drivetrain hardware
pub mod hardware;

/// Provides the controllers that make up the drivetrain
pub mod drive_elements;

/// Provides the commands and button bindings that are processed at tick boundaries
pub mod events;

/// Provides the key/value telemetry output
pub mod telemetry;

/// Provides the drivetrain configuration and its defaults
pub mod config;

/// Provides the top-level object that owns the drivetrain
pub mod robot;

/// Defines the different errors for the swerve drive crate.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A gain, tolerance, limit or period in the configuration is not usable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Describes which value was rejected and why
        reason: String,
    },

    /// The control points of an input curve do not describe a monotonic curve on [0, 1].
    #[error("Invalid input curve: {reason}")]
    InvalidInputCurve {
        /// Describes which control point was rejected and why
        reason: String,
    },

    /// The configuration text could not be decoded.
    #[error("Failed to parse the configuration: {reason}")]
    ConfigurationParse {
        /// The decoder message
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read the configuration file {path}: {reason}")]
    ConfigurationRead {
        /// The path of the file
        path: String,
        /// The I/O error message
        reason: String,
    },

    /// The module positions do not allow the chassis motion to be recovered from the
    /// module states.
    #[error("The module positions do not span the chassis motion")]
    DegenerateModuleLayout,

    /// The actuator feedback for a module did not update.
    #[error("No fresh feedback for module {module}")]
    StaleFeedback {
        /// The module for which no feedback was available
        module: ModuleId,
    },

    /// The tilt sensor could not provide an estimate.
    #[error("The tilt sensor is unavailable")]
    SensorUnavailable,

    /// The receiving side of the drive command channel has been dropped.
    #[error("The drive command channel is disconnected")]
    CommandQueueDisconnected,
}
