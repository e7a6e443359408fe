//! Defines the configuration of the drivetrain.
//!
//! The configuration is read from TOML. Every section and every value has a default, so a file
//! only needs to list the values that differ from the defaults:
//!
//! ```toml
//! loop_period = 0.02
//!
//! [traction]
//! enabled = false
//! slip_threshold = 0.08
//!
//! [navigation]
//! lookahead = 2.5
//! ```

use std::{f64::consts::PI, path::Path};

extern crate nalgebra as na;

use na::Vector2;
use serde::{Deserialize, Serialize};

use crate::{
    closed_loop::GainSet,
    drive_elements::{
        anti_tip::AntiTipController,
        drive_coordinator::Centricity,
        kinematics::SwerveKinematics,
        module_controller::{ModuleConfig, ModuleController, SoftLimits},
        pose_navigator::{GoalTolerance, PoseNavigator},
        traction_control::TractionController,
    },
    events::{default_bindings, Binding},
    geometry::{ModuleId, Pose},
    input_shaping::{InputCurve, InputShaper},
    Error,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

/// The control points of an input curve.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CurveConfig {
    /// The stick magnitudes, strictly increasing on [0, 1]
    pub x: Vec<f64>,
    /// The shaped magnitudes, non-decreasing
    pub y: Vec<f64>,
}

impl CurveConfig {
    fn build(&self) -> Result<InputCurve, Error> {
        InputCurve::new(&self.x, &self.y)
    }
}

/// The shaping of the operator input.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// The stick magnitude below which the input is ignored.
    pub deadband: f64,

    /// The curve for the throttle and strafe axes. The output is in meters per second.
    pub throttle_curve: CurveConfig,

    /// The curve for the turn axis. The output is a fraction of the turn scalar.
    pub turn_curve: CurveConfig,

    /// The rotational speed, in degrees per second, at full turn input.
    pub turn_scalar: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            deadband: 0.10,
            throttle_curve: CurveConfig {
                x: vec![0.0, 0.5, 1.0],
                y: vec![0.0, 1.975, 3.95],
            },
            turn_curve: CurveConfig {
                x: vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
                y: vec![
                    0.0, 0.008, 0.032, 0.072, 0.128, 0.200, 0.288, 0.392, 0.512, 0.768, 1.0,
                ],
            },
            turn_scalar: 40.0,
        }
    }
}

impl InputConfig {
    /// Builds the [InputShaper] for the curves and the deadband.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidInputCurve] - Returned when the control points of a curve are not usable.
    /// * [Error::InvalidConfiguration] - Returned when the deadband is outside [0, 1).
    pub fn build_shaper(&self) -> Result<InputShaper, Error> {
        InputShaper::new(
            self.throttle_curve.build()?,
            self.turn_curve.build()?,
            self.deadband,
        )
    }

    /// Returns the rotational speed, in radians per second, at full turn input.
    pub fn max_turn_rate(&self) -> f64 {
        self.turn_scalar.to_radians()
    }
}

/// The configuration shared by the four swerve modules.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// The wheel speed loop.
    pub drive: ModuleConfig,

    /// The steering angle loop.
    pub steer: ModuleConfig,

    /// The `[x, y]` offsets of the modules from the chassis center in meters, in the order front
    /// left, front right, rear left, rear right.
    pub offsets: [[f64; 2]; 4],

    /// The largest wheel speed in meters per second.
    pub max_module_speed: f64,

    /// The number of ticks without fresh feedback after which a module is degraded.
    pub stale_feedback_ticks: u32,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        let half_track = 0.28;
        Self {
            drive: ModuleConfig {
                gains: GainSet::from_constants(0.1, 0.0, 0.0, 1.0),
                sensor_phase: false,
                inverted: false,
                tolerance: 0.01,
                soft_limits: None,
            },
            steer: ModuleConfig {
                gains: GainSet::from_constants(1.0, 0.0, 0.0, 0.0),
                sensor_phase: false,
                inverted: false,
                tolerance: 0.01,
                soft_limits: Some(SoftLimits {
                    lower: 0.0,
                    upper: 0.0,
                    enabled: false,
                }),
            },
            offsets: [
                [half_track, half_track],
                [half_track, -half_track],
                [-half_track, half_track],
                [-half_track, -half_track],
            ],
            max_module_speed: 3.95,
            stale_feedback_ticks: 5,
        }
    }
}

/// The configuration of the slip limiting.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct TractionConfig {
    /// Whether traction control is enabled at start-up.
    pub enabled: bool,

    /// The slip ratio magnitude above which the velocity is limited.
    pub slip_threshold: f64,

    /// The commanded wheel speed, in meters per second, below which slip is not measured.
    pub min_expected_speed: f64,
}

impl Default for TractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slip_threshold: 0.05,
            min_expected_speed: 0.05,
        }
    }
}

/// The configuration of the tilt compensation.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AntiTipConfig {
    /// The gains of the compensator, on the tilt in radians.
    pub gains: GainSet,

    /// The tilt, in radians, above which the compensation is active.
    pub onset_angle: f64,

    /// The largest correction speed in meters per second.
    pub max_correction: f64,
}

impl Default for AntiTipConfig {
    fn default() -> Self {
        Self {
            // The robot's anti-tip constants, applied to the tilt in radians
            gains: GainSet::from_constants(0.010, 0.0, 0.0005, 0.0),
            onset_angle: 5.0_f64.to_radians(),
            max_correction: 1.0,
        }
    }
}

/// The configuration of the goal seeking.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// The gains of the loop on the distance to the aim point.
    pub translation_gains: GainSet,

    /// The gains of the heading loop, on the heading error in radians.
    pub heading_gains: GainSet,

    /// The largest distance to the aim point in meters.
    pub lookahead: f64,

    /// How close the robot has to get to a goal.
    pub tolerance: GoalTolerance,

    /// The largest translational speed in meters per second.
    pub max_speed: f64,

    /// The largest rotational speed in radians per second.
    pub max_rotation: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        // The heading gains are tuned per degree
        let per_degree = 180.0 / PI;
        Self {
            translation_gains: GainSet::from_constants(1.0, 0.0, 0.0, 0.0),
            heading_gains: GainSet::from_constants(
                0.019 * per_degree,
                0.0,
                0.0014 * per_degree,
                0.0,
            ),
            lookahead: 3.0,
            tolerance: GoalTolerance {
                position: 0.05,
                heading: 2.0_f64.to_radians(),
            },
            max_speed: 3.95,
            max_rotation: PI,
        }
    }
}

/// The named poses on the field.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FieldConfig {
    /// The pose in front of the amp.
    pub amp: Pose,
    /// The pose in front of the source.
    pub source: Pose,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            amp: Pose::new(1.84, 7.60, -0.5 * PI),
            source: Pose::new(15.40, 0.95, 2.10),
        }
    }
}

/// The complete configuration of the drivetrain.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DriveConfig {
    /// The control period in seconds.
    pub loop_period: f64,

    /// The shaping of the operator input.
    pub input: InputConfig,

    /// The swerve modules.
    pub modules: ModulesConfig,

    /// The slip limiting.
    pub traction: TractionConfig,

    /// The tilt compensation.
    pub anti_tip: AntiTipConfig,

    /// The goal seeking.
    pub navigation: NavigationConfig,

    /// The frame in which the operator input is interpreted at start-up.
    pub centricity: Centricity,

    /// The named poses on the field.
    pub field: FieldConfig,

    /// The button binding table. The default table is used when this is not set.
    pub bindings: Option<Vec<Binding>>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            loop_period: 1.0 / 50.0,
            input: InputConfig::default(),
            modules: ModulesConfig::default(),
            traction: TractionConfig::default(),
            anti_tip: AntiTipConfig::default(),
            navigation: NavigationConfig::default(),
            centricity: Centricity::FieldCentric,
            field: FieldConfig::default(),
            bindings: None,
        }
    }
}

impl DriveConfig {
    /// Returns the button binding table.
    pub fn bindings(&self) -> Vec<Binding> {
        match &self.bindings {
            Some(b) => b.clone(),
            None => default_bindings(self.field.amp, self.field.source),
        }
    }

    /// Reads and validates the configuration from a TOML file.
    ///
    /// ## Errors
    ///
    /// * [Error::ConfigurationRead] - Returned when the file cannot be read.
    /// * [Error::ConfigurationParse] - Returned when the file is not a valid configuration.
    /// * Any error returned by [DriveConfig::validate()].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigurationRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&text)
    }

    /// Parses and validates the configuration from TOML text.
    ///
    /// ## Errors
    ///
    /// * [Error::ConfigurationParse] - Returned when the text is not a valid configuration.
    /// * Any error returned by [DriveConfig::validate()].
    ///
    /// ## Examples
    ///
    /// ```
    /// use swerve_drive_core::config::DriveConfig;
    ///
    /// let config = DriveConfig::from_toml_str("[traction]\nenabled = false").unwrap();
    /// assert!(!config.traction.enabled);
    /// assert_eq!(0.05, config.traction.slip_threshold);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: DriveConfig = toml::from_str(text).map_err(|e| Error::ConfigurationParse {
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks every value in the configuration.
    ///
    /// The check builds each controller from its part of the configuration, so a configuration
    /// that passes can always be turned into a drivetrain.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when a gain, tolerance, limit or period is not
    ///   usable.
    /// * [Error::InvalidInputCurve] - Returned when the control points of a curve are not usable.
    /// * [Error::DegenerateModuleLayout] - Returned when the module offsets do not span the
    ///   chassis motion.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.loop_period.is_finite() || self.loop_period <= 0.0 {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "the loop period must be a positive number. Found {}",
                    self.loop_period
                ),
            });
        }

        if !self.input.turn_scalar.is_finite() || self.input.turn_scalar < 0.0 {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "the turn scalar must be a finite, non-negative number. Found {}",
                    self.input.turn_scalar
                ),
            });
        }
        self.input.build_shaper()?;

        ModuleController::new(
            ModuleId::FrontLeft,
            self.modules.drive,
            self.modules.steer,
            self.modules.stale_feedback_ticks,
        )?;
        SwerveKinematics::new(
            self.modules
                .offsets
                .map(|o| Vector2::new(o[0], o[1])),
            self.modules.max_module_speed,
        )?;

        TractionController::new(
            self.traction.slip_threshold,
            self.traction.min_expected_speed,
        )?;
        AntiTipController::new(
            self.anti_tip.gains,
            self.anti_tip.onset_angle,
            self.anti_tip.max_correction,
        )?;

        self.navigation.tolerance.validate()?;
        PoseNavigator::new(
            self.navigation.translation_gains,
            self.navigation.heading_gains,
            self.navigation.lookahead,
            self.navigation.max_speed,
            self.navigation.max_rotation,
        )?;

        Ok(())
    }
}
