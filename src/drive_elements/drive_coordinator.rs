//! Defines the per-tick orchestration of the drivetrain.
//!
//! Every tick runs the same steps in the same order:
//!
//! 1. Apply the commands that were queued since the previous tick.
//! 2. Read the module feedback and the chassis tilt.
//! 3. Resolve the desired velocity from the active navigation goal, or from the operator input
//!    when there is no goal.
//! 4. Limit the velocity for wheel slip, when traction control is enabled.
//! 5. Correct the velocity for chassis tilt.
//! 6. Convert the velocity into module states and hand them to the module controllers.
//! 7. Update the odometry from the module feedback.
//! 8. Publish the telemetry.
//!
//! None of the steps block. Failures to read feedback or tilt are absorbed: the last known
//! module state is kept and a missing tilt reading is treated as a level chassis.

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

extern crate nalgebra as na;

use na::Vector2;

use crate::{
    config::DriveConfig,
    drive_elements::{
        anti_tip::AntiTipController,
        kinematics::{Odometry, SwerveKinematics},
        module_controller::ModuleController,
        pose_navigator::{GoalTolerance, NavigationGoal, PoseNavigator},
        traction_control::{TractionController, TractionSample, TractionStatus},
    },
    events::DriveCommand,
    geometry::{ChassisVelocity, ModuleId, ModuleState, Pose},
    hardware::{
        actuator_interface::ActuatorInterface,
        sensor_interface::{TiltEstimate, TiltSensor},
    },
    input_shaping::{CurveId, InputShaper},
    telemetry::{TelemetrySink, TelemetryValue},
    Error,
};

#[cfg(test)]
#[path = "drive_coordinator_tests.rs"]
mod drive_coordinator_tests;

/// Defines the frame in which the operator input is interpreted.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Centricity {
    /// Pushing the stick forward drives along the field x-axis, whatever the heading of the
    /// robot.
    FieldCentric,
    /// Pushing the stick forward drives towards the front of the robot.
    RobotCentric,
}

impl Centricity {
    fn name(&self) -> &'static str {
        match self {
            Centricity::FieldCentric => "FieldCentric",
            Centricity::RobotCentric => "RobotCentric",
        }
    }

    fn toggled(&self) -> Self {
        match self {
            Centricity::FieldCentric => Centricity::RobotCentric,
            Centricity::RobotCentric => Centricity::FieldCentric,
        }
    }
}

/// Stores the operator stick positions for a single tick.
///
/// All axes are normalized to [-1, 1]. Positive throttle drives forward, positive strafe drives
/// to the left and positive turn rotates counter-clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OperatorInput {
    /// The forward / backward axis
    pub throttle: f64,
    /// The left / right axis
    pub strafe: f64,
    /// The rotation axis
    pub turn: f64,
}

impl OperatorInput {
    /// Creates a new [OperatorInput].
    pub fn new(throttle: f64, strafe: f64, turn: f64) -> Self {
        Self {
            throttle,
            strafe,
            turn,
        }
    }
}

/// Describes what happened during a single tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    /// The robot-relative velocity before limiting.
    pub requested: ChassisVelocity,

    /// The robot-relative velocity after traction and anti-tip limiting.
    pub limited: ChassisVelocity,

    /// The traction limiting that was applied.
    pub traction: TractionStatus,

    /// The anti-tip correction speed that was applied.
    pub anti_tip_correction: f64,

    /// Set when the navigation goal was reached during this tick.
    pub goal_reached: bool,

    /// The module states handed to the module controllers.
    pub module_targets: [ModuleState; 4],
}

/// Runs the drivetrain once per control period.
///
/// The coordinator owns the four module controllers, the limiting controllers, the navigator and
/// the odometry. External events reach it only through the command channel, which it drains at
/// the start of every tick.
pub struct DriveCoordinator {
    /// The module controllers, indexed by [ModuleId::index()].
    modules: [ModuleController; 4],

    /// The mapping between chassis velocities and module states.
    kinematics: SwerveKinematics,

    /// The shaping of the operator input.
    shaper: InputShaper,

    /// The rotational speed, in radians per second, that full turn input produces.
    max_turn_rate: f64,

    /// The slip limiting.
    traction: TractionController,

    /// Whether the slip limiting is applied.
    traction_enabled: bool,

    /// The tilt compensation.
    anti_tip: AntiTipController,

    /// The goal seeking.
    navigator: PoseNavigator,

    /// The active navigation goal, if any.
    goal: Option<NavigationGoal>,

    /// The tolerance given to new navigation goals.
    goal_tolerance: GoalTolerance,

    /// The pose estimate.
    odometry: Odometry,

    /// The frame in which the operator input is interpreted.
    centricity: Centricity,

    /// The hardware that moves the modules.
    actuator: Box<dyn ActuatorInterface>,

    /// The hardware that senses the chassis tilt.
    tilt_sensor: Box<dyn TiltSensor>,

    /// Whether the last tilt read failed.
    tilt_unavailable: bool,

    /// The output for the telemetry.
    telemetry: Box<dyn TelemetrySink>,

    /// The receiving side of the command channel.
    commands: Receiver<DriveCommand>,
}

impl DriveCoordinator {
    /// Returns the active navigation goal, if any.
    pub fn active_goal(&self) -> Option<&NavigationGoal> {
        self.goal.as_ref()
    }

    fn apply_command(&mut self, command: DriveCommand) {
        match command {
            DriveCommand::GoToPose { target } => {
                let goal = NavigationGoal::new(target, self.goal_tolerance);
                info!(goal = %goal.id(), x = target.x, y = target.y, heading = target.heading, "Navigation goal started");
                self.goal = Some(goal);
            }
            DriveCommand::CancelNavigation => {
                if let Some(goal) = self.goal.take() {
                    info!(goal = %goal.id(), "Navigation goal cancelled");
                }
            }
            DriveCommand::ToggleTractionControl => {
                self.set_traction_control(!self.traction_enabled);
            }
            DriveCommand::SetTractionControl(enabled) => {
                self.set_traction_control(enabled);
            }
            DriveCommand::ResetOdometry { pose } => {
                info!(x = pose.x, y = pose.y, heading = pose.heading, "Odometry reset");
                self.odometry.reset(pose);
            }
            DriveCommand::ToggleCentricity => {
                self.centricity = self.centricity.toggled();
                info!(centricity = self.centricity.name(), "Control centricity changed");
            }
        }
    }

    /// Returns the frame in which the operator input is interpreted.
    pub fn centricity(&self) -> Centricity {
        self.centricity
    }

    /// Returns the controller for the given module.
    pub fn module(&self, module: ModuleId) -> &ModuleController {
        &self.modules[module.index()]
    }

    /// Creates a new [DriveCoordinator].
    ///
    /// ## Parameters
    ///
    /// * 'config' - The configuration of the drivetrain
    /// * 'actuator' - The hardware that moves the modules
    /// * 'tilt_sensor' - The hardware that senses the chassis tilt
    /// * 'telemetry' - The output for the telemetry
    /// * 'commands' - The receiving side of the command channel
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when any of the gains, tolerances or limits in
    ///   the configuration is not usable.
    /// * [Error::InvalidInputCurve] - Returned when the control points of an input curve are not
    ///   usable.
    /// * [Error::DegenerateModuleLayout] - Returned when the module offsets do not span the chassis
    ///   motion.
    pub fn new(
        config: &DriveConfig,
        actuator: Box<dyn ActuatorInterface>,
        tilt_sensor: Box<dyn TiltSensor>,
        telemetry: Box<dyn TelemetrySink>,
        commands: Receiver<DriveCommand>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let modules_config = &config.modules;
        let create_module = |id: ModuleId| {
            ModuleController::new(
                id,
                modules_config.drive,
                modules_config.steer,
                modules_config.stale_feedback_ticks,
            )
        };
        let modules = [
            create_module(ModuleId::FrontLeft)?,
            create_module(ModuleId::FrontRight)?,
            create_module(ModuleId::RearLeft)?,
            create_module(ModuleId::RearRight)?,
        ];

        let offsets = modules_config
            .offsets
            .map(|offset| Vector2::new(offset[0], offset[1]));
        let kinematics = SwerveKinematics::new(offsets, modules_config.max_module_speed)?;

        let navigation = &config.navigation;
        let navigator = PoseNavigator::new(
            navigation.translation_gains,
            navigation.heading_gains,
            navigation.lookahead,
            navigation.max_speed,
            navigation.max_rotation,
        )?;

        let result = Self {
            modules,
            kinematics,
            shaper: config.input.build_shaper()?,
            max_turn_rate: config.input.max_turn_rate(),
            traction: TractionController::new(
                config.traction.slip_threshold,
                config.traction.min_expected_speed,
            )?,
            traction_enabled: config.traction.enabled,
            anti_tip: AntiTipController::new(
                config.anti_tip.gains,
                config.anti_tip.onset_angle,
                config.anti_tip.max_correction,
            )?,
            navigator,
            goal: None,
            goal_tolerance: navigation.tolerance,
            odometry: Odometry::new(Pose::origin()),
            centricity: config.centricity,
            actuator,
            tilt_sensor,
            tilt_unavailable: false,
            telemetry,
            commands,
        };

        info!(
            traction_enabled = result.traction_enabled,
            centricity = result.centricity.name(),
            "Drive coordinator created"
        );

        Ok(result)
    }

    /// Returns the current pose estimate.
    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    fn publish_telemetry(&mut self, report: &TickReport, tilt: &TiltEstimate) {
        let pose = self.odometry.pose();
        let sink = self.telemetry.as_mut();
        sink.publish("Drive/Pose/X", pose.x.into());
        sink.publish("Drive/Pose/Y", pose.y.into());
        sink.publish("Drive/Pose/Heading", pose.heading.into());

        for module in self.modules.iter() {
            let name = module.id().name();
            let state = module.state();
            let target = module.target();
            sink.publish(&format!("Drive/{}/Speed", name), state.speed.into());
            sink.publish(&format!("Drive/{}/Angle", name), state.angle.into());
            sink.publish(&format!("Drive/{}/TargetSpeed", name), target.speed.into());
            sink.publish(&format!("Drive/{}/TargetAngle", name), target.angle.into());
            sink.publish(&format!("Drive/{}/AtTarget", name), module.at_target().into());
            sink.publish(&format!("Drive/{}/Degraded", name), module.is_degraded().into());
        }

        sink.publish("Drive/Traction/Enabled", self.traction_enabled.into());
        sink.publish("Drive/Traction/Scale", report.traction.scale.into());
        sink.publish(
            "Drive/Traction/SlippingModules",
            TelemetryValue::Number(report.traction.slipping_modules as f64),
        );

        sink.publish("Drive/AntiTip/Pitch", tilt.pitch.into());
        sink.publish("Drive/AntiTip/Roll", tilt.roll.into());
        sink.publish("Drive/AntiTip/Correction", report.anti_tip_correction.into());
        sink.publish("Drive/AntiTip/SensorAvailable", (!self.tilt_unavailable).into());

        sink.publish("Drive/Navigation/Active", self.goal.is_some().into());
        sink.publish("Drive/Navigation/GoalReached", report.goal_reached.into());
        sink.publish("Drive/Centricity", self.centricity.name().into());
    }

    fn read_tilt(&mut self) -> TiltEstimate {
        match self.tilt_sensor.tilt() {
            Ok(tilt) => {
                if self.tilt_unavailable {
                    info!("Tilt sensor available again");
                }
                self.tilt_unavailable = false;
                tilt
            }
            Err(e) => {
                if !self.tilt_unavailable {
                    warn!(error = %e, "Tilt sensor unavailable. Assuming a level chassis");
                }
                self.tilt_unavailable = true;
                TiltEstimate::level()
            }
        }
    }

    fn resolve_velocity(
        &mut self,
        input: &OperatorInput,
        period_in_seconds: f64,
    ) -> (ChassisVelocity, bool) {
        let pose = self.odometry.pose();
        if self.goal.is_some() {
            let (field_velocity, reached) =
                self.navigator
                    .advance(&pose, self.goal.as_ref(), period_in_seconds);
            if reached {
                if let Some(goal) = self.goal.take() {
                    info!(goal = %goal.id(), "Navigation goal reached");
                }
            }

            return (field_velocity.field_to_robot(pose.heading), reached);
        }

        // Without a goal the navigator drops whatever it accumulated for the previous one
        self.navigator.advance(&pose, None, period_in_seconds);

        let operator = ChassisVelocity::new(
            self.shaper.shape(CurveId::Throttle, input.throttle),
            self.shaper.shape(CurveId::Throttle, input.strafe),
            self.shaper.shape(CurveId::Turn, input.turn) * self.max_turn_rate,
        );

        let robot = match self.centricity {
            Centricity::FieldCentric => operator.field_to_robot(pose.heading),
            Centricity::RobotCentric => operator,
        };

        (robot, false)
    }

    fn set_traction_control(&mut self, enabled: bool) {
        if self.traction_enabled != enabled {
            info!(enabled, "Traction control changed");
        }
        self.traction_enabled = enabled;
    }

    /// Runs one control period.
    ///
    /// ## Parameters
    ///
    /// * 'input' - The operator stick positions. Ignored while a navigation goal is active.
    /// * 'period_in_seconds' - The time since the previous tick
    pub fn tick(&mut self, input: &OperatorInput, period_in_seconds: f64) -> TickReport {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }

        for module in self.modules.iter_mut() {
            module.refresh_feedback(self.actuator.as_ref());
        }
        let tilt = self.read_tilt();

        let (requested, goal_reached) = self.resolve_velocity(input, period_in_seconds);

        let (limited, traction) = if self.traction_enabled {
            let samples: [TractionSample; 4] = std::array::from_fn(|i| {
                let module = &self.modules[i];
                if !module.has_fresh_feedback() {
                    TractionSample::default()
                } else {
                    self.traction
                        .sample(module.commanded_speed(), module.state().speed)
                }
            });
            self.traction.limit(&requested, &samples)
        } else {
            (requested, TractionStatus::default())
        };

        let limited = self.anti_tip.compensate(&limited, &tilt, period_in_seconds);

        let previous: [ModuleState; 4] = std::array::from_fn(|i| self.modules[i].target());
        let module_targets = self.kinematics.to_module_states(&limited, &previous);
        for (module, target) in self.modules.iter_mut().zip(module_targets.iter()) {
            module.set_target(target.speed, target.angle);
            module.apply(self.actuator.as_mut(), period_in_seconds);
        }

        // Only modules with fresh feedback contribute to the odometry
        let measured: [ModuleState; 4] = std::array::from_fn(|i| self.modules[i].state());
        let fresh: [bool; 4] = std::array::from_fn(|i| self.modules[i].has_fresh_feedback());
        if let Some(chassis) = self
            .kinematics
            .to_chassis_velocity_from_measured(&measured, &fresh)
        {
            self.odometry.update(&chassis, period_in_seconds);
        }

        let report = TickReport {
            requested,
            limited,
            traction,
            anti_tip_correction: self.anti_tip.correction(),
            goal_reached,
            module_targets,
        };
        self.publish_telemetry(&report, &tilt);

        report
    }

    /// Returns a value indicating whether traction control is enabled.
    pub fn traction_enabled(&self) -> bool {
        self.traction_enabled
    }
}
