use super::*;
use crate::{
    closed_loop::GainSet,
    events::command_channel,
    hardware::{actuator_interface::SimulatedActuator, sensor_interface::SimulatedTiltSensor},
    telemetry::RecordingTelemetry,
};
use crossbeam_channel::Sender;
use float_cmp::{ApproxEq, F64Margin};
use std::f64::consts::PI;

const PERIOD: f64 = 0.02;

fn assert_close(expected: f64, actual: f64) {
    assert!(
        expected.approx_eq(
            actual,
            F64Margin {
                ulps: 2,
                epsilon: 1e-9
            }
        ),
        "Expected {:.9} and {:.9} to be equal within 2 ulps or 1e-9",
        expected,
        actual
    );
}

struct TestRig {
    coordinator: DriveCoordinator,
    actuator: SimulatedActuator,
    tilt: SimulatedTiltSensor,
    telemetry: RecordingTelemetry,
    commands: Sender<DriveCommand>,
}

fn create_rig(config: &DriveConfig) -> TestRig {
    let actuator = SimulatedActuator::new();
    let tilt = SimulatedTiltSensor::new();
    let telemetry = RecordingTelemetry::new();
    let (sender, receiver) = command_channel();

    let coordinator = DriveCoordinator::new(
        config,
        Box::new(actuator.clone()),
        Box::new(tilt.clone()),
        Box::new(telemetry.clone()),
        receiver,
    )
    .unwrap();

    TestRig {
        coordinator,
        actuator,
        tilt,
        telemetry,
        commands: sender,
    }
}

#[test]
fn test_new_instance() {
    let rig = create_rig(&DriveConfig::default());

    assert!(rig.coordinator.traction_enabled());
    assert_eq!(Centricity::FieldCentric, rig.coordinator.centricity());
    assert_eq!(Pose::origin(), rig.coordinator.pose());
    assert!(rig.coordinator.active_goal().is_none());
}

#[test]
fn when_creating_a_coordinator_with_an_invalid_configuration_it_should_error() {
    let mut config = DriveConfig::default();
    config.modules.max_module_speed = 0.0;
    let (_, receiver) = command_channel();

    let result = DriveCoordinator::new(
        &config,
        Box::new(SimulatedActuator::new()),
        Box::new(SimulatedTiltSensor::new()),
        Box::new(RecordingTelemetry::new()),
        receiver,
    );

    match result {
        Err(Error::InvalidConfiguration { reason: _ }) => {}
        _ => panic!("Expected an invalid configuration error"),
    }
}

#[test]
fn when_driving_at_full_throttle_all_modules_should_get_the_same_forward_speed() {
    let mut rig = create_rig(&DriveConfig::default());

    let report = rig
        .coordinator
        .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);

    assert_close(3.95, report.requested.vx);
    assert_close(0.0, report.requested.vy);
    assert_eq!(0.0, report.limited.omega);
    for id in ModuleId::ALL {
        let target = rig.coordinator.module(id).target();
        assert_close(3.95, target.speed.abs());
        assert_close(0.0, target.angle);
    }
}

#[test]
fn when_a_module_slips_the_next_tick_should_scale_the_speed_down() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.actuator.set_slip_ratio(ModuleId::FrontLeft, 0.20);
    let input = OperatorInput::new(1.0, 0.0, 0.0);

    let first = rig.coordinator.tick(&input, PERIOD);
    let second = rig.coordinator.tick(&input, PERIOD);

    assert_eq!(1.0, first.traction.scale);
    assert_close(3.95, first.limited.speed());

    // 1 / (1 + 0.20 - 0.05)
    let expected_scale = 1.0 / 1.15;
    assert_eq!(1, second.traction.slipping_modules);
    assert!(!second.traction.rotation_limited);
    assert!((second.traction.scale - expected_scale).abs() < 1e-9);
    assert!(second.limited.speed() < second.requested.speed());
    assert!((second.limited.speed() / second.requested.speed() - expected_scale).abs() < 1e-9);
    for target in second.module_targets {
        assert!((target.speed - 3.95 * expected_scale).abs() < 1e-9);
    }
}

#[test]
fn when_traction_control_is_disabled_slip_should_not_limit_the_speed() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.actuator.set_slip_ratio(ModuleId::FrontLeft, 0.20);
    rig.commands
        .send(DriveCommand::ToggleTractionControl)
        .unwrap();
    let input = OperatorInput::new(1.0, 0.0, 0.0);

    rig.coordinator.tick(&input, PERIOD);
    let second = rig.coordinator.tick(&input, PERIOD);

    assert!(!rig.coordinator.traction_enabled());
    assert_eq!(TractionStatus::default(), second.traction);
    assert_eq!(second.requested, second.limited);
    assert_eq!(Some(false), rig.telemetry.flag("Drive/Traction/Enabled"));
}

#[test]
fn when_field_centric_the_input_should_be_rotated_by_the_heading() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.commands
        .send(DriveCommand::ResetOdometry {
            pose: Pose::new(0.0, 0.0, 0.5 * PI),
        })
        .unwrap();

    let report = rig
        .coordinator
        .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);

    // Field forward is to the right of a robot that faces the field y-axis
    assert_close(0.0, report.requested.vx);
    assert_close(-3.95, report.requested.vy);
    assert_close(-0.5 * PI, report.module_targets[0].angle);
}

#[test]
fn when_robot_centric_the_input_should_not_be_rotated() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.commands
        .send(DriveCommand::ResetOdometry {
            pose: Pose::new(0.0, 0.0, 0.5 * PI),
        })
        .unwrap();
    rig.commands.send(DriveCommand::ToggleCentricity).unwrap();

    let report = rig
        .coordinator
        .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);

    assert_eq!(Centricity::RobotCentric, rig.coordinator.centricity());
    assert_close(3.95, report.requested.vx);
    assert_close(0.0, report.requested.vy);
}

#[test]
fn when_turning_the_rotation_should_follow_the_turn_curve() {
    let mut config = DriveConfig::default();
    config.centricity = Centricity::RobotCentric;
    let mut rig = create_rig(&config);

    let report = rig
        .coordinator
        .tick(&OperatorInput::new(0.0, 0.0, -0.5), PERIOD);

    assert_close(0.0, report.requested.speed());
    assert_close(-0.2 * 40.0_f64.to_radians(), report.requested.omega);
}

#[test]
fn when_a_navigation_goal_is_active_it_should_override_the_operator_input() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.commands
        .send(DriveCommand::GoToPose {
            target: Pose::new(2.0, 0.0, 0.0),
        })
        .unwrap();

    let report = rig
        .coordinator
        .tick(&OperatorInput::new(0.0, 1.0, 0.0), PERIOD);

    assert!(rig.coordinator.active_goal().is_some());
    assert!(!report.goal_reached);
    assert_close(2.0, report.requested.vx);
    assert_close(0.0, report.requested.vy);
    assert_eq!(Some(true), rig.telemetry.flag("Drive/Navigation/Active"));
}

#[test]
fn when_the_goal_is_reached_it_should_be_cleared() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.commands
        .send(DriveCommand::GoToPose {
            target: Pose::new(0.01, 0.0, 0.0),
        })
        .unwrap();

    let report = rig.coordinator.tick(&OperatorInput::default(), PERIOD);

    assert!(report.goal_reached);
    assert_eq!(ChassisVelocity::zero(), report.requested);
    assert!(rig.coordinator.active_goal().is_none());
    assert_eq!(Some(true), rig.telemetry.flag("Drive/Navigation/GoalReached"));
}

#[test]
fn when_navigation_is_cancelled_the_operator_should_regain_control() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.commands
        .send(DriveCommand::GoToPose {
            target: Pose::new(5.0, 0.0, 0.0),
        })
        .unwrap();
    rig.coordinator.tick(&OperatorInput::default(), PERIOD);

    rig.commands.send(DriveCommand::CancelNavigation).unwrap();
    let report = rig.coordinator.tick(&OperatorInput::default(), PERIOD);

    assert!(rig.coordinator.active_goal().is_none());
    assert_eq!(ChassisVelocity::zero(), report.requested);
}

#[test]
fn when_the_chassis_tilts_the_velocity_should_be_corrected() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.tilt.set_tilt(Some(TiltEstimate::new(0.3, 0.0)));

    let report = rig.coordinator.tick(&OperatorInput::default(), PERIOD);

    assert!(report.anti_tip_correction > 0.0);
    assert_close(report.anti_tip_correction, report.limited.vx);
    assert_eq!(
        Some(report.anti_tip_correction),
        rig.telemetry.number("Drive/AntiTip/Correction")
    );
}

#[test]
fn when_the_tilt_sensor_is_unavailable_it_should_assume_a_level_chassis() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.tilt.set_tilt(None);

    let report = rig
        .coordinator
        .tick(&OperatorInput::new(0.5, 0.0, 0.0), PERIOD);

    assert_eq!(0.0, report.anti_tip_correction);
    assert_eq!(report.requested, report.limited);
    assert_eq!(
        Some(false),
        rig.telemetry.flag("Drive/AntiTip/SensorAvailable")
    );
}

#[test]
fn when_module_feedback_stays_stale_the_module_should_be_reported_degraded() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.actuator
        .set_feedback_available(ModuleId::RearRight, false);

    for _ in 0..5 {
        rig.coordinator
            .tick(&OperatorInput::new(0.5, 0.0, 0.0), PERIOD);
    }

    assert!(rig.coordinator.module(ModuleId::RearRight).is_degraded());
    assert!(!rig.coordinator.module(ModuleId::FrontLeft).is_degraded());
    assert_eq!(Some(true), rig.telemetry.flag("Drive/RearRight/Degraded"));
    assert_eq!(Some(false), rig.telemetry.flag("Drive/FrontLeft/Degraded"));
}

#[test]
fn when_feedback_drops_out_a_changed_command_should_not_look_like_slip() {
    let mut rig = create_rig(&DriveConfig::default());
    for _ in 0..20 {
        rig.coordinator
            .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);
    }

    rig.actuator
        .set_feedback_available(ModuleId::FrontLeft, false);
    let input = OperatorInput::new(0.5, 0.0, 0.0);
    let first = rig.coordinator.tick(&input, PERIOD);
    let second = rig.coordinator.tick(&input, PERIOD);

    let module = rig.coordinator.module(ModuleId::FrontLeft);
    assert!(!module.has_fresh_feedback());
    assert!(!module.is_degraded());
    for report in [first, second] {
        assert_eq!(0, report.traction.slipping_modules);
        assert_eq!(1.0, report.traction.scale);
        assert_eq!(report.requested, report.limited);
    }
}

#[test]
fn when_all_feedback_is_lost_the_odometry_should_hold_the_pose() {
    let mut rig = create_rig(&DriveConfig::default());
    for _ in 0..5 {
        rig.coordinator
            .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);
    }
    let before = rig.coordinator.pose();
    assert!(before.x > 0.0);

    for id in ModuleId::ALL {
        rig.actuator.set_feedback_available(id, false);
    }
    for _ in 0..500 {
        rig.coordinator.tick(&OperatorInput::default(), PERIOD);
    }

    assert_eq!(before, rig.coordinator.pose());
}

#[test]
fn when_one_module_has_no_feedback_the_odometry_should_use_the_others() {
    let mut config = DriveConfig::default();
    config.modules.drive.gains = GainSet::new(0.0, 0.0, 0.0, 1.0).unwrap();
    let mut rig = create_rig(&config);
    rig.actuator
        .set_feedback_available(ModuleId::RearRight, false);

    for _ in 0..51 {
        rig.coordinator
            .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);
    }

    assert!(rig.coordinator.module(ModuleId::RearRight).is_degraded());
    assert!((rig.coordinator.pose().x - 3.95).abs() < 1e-6);
    assert!(rig.coordinator.pose().y.abs() < 1e-9);
}

#[test]
fn when_the_modules_track_their_targets_they_should_be_reported_at_target() {
    let mut config = DriveConfig::default();
    config.modules.drive.gains = GainSet::new(0.0, 0.0, 0.0, 1.0).unwrap();
    let mut rig = create_rig(&config);
    let input = OperatorInput::new(1.0, 0.0, 0.0);

    rig.coordinator.tick(&input, PERIOD);
    assert_eq!(Some(false), rig.telemetry.flag("Drive/FrontLeft/AtTarget"));

    rig.coordinator.tick(&input, PERIOD);
    for id in ModuleId::ALL {
        assert!(rig.coordinator.module(id).at_target());
        assert_eq!(
            Some(true),
            rig.telemetry.flag(&format!("Drive/{}/AtTarget", id.name()))
        );
    }
}

#[test]
fn when_driving_forward_the_odometry_should_follow() {
    let mut config = DriveConfig::default();
    config.modules.drive.gains = GainSet::new(0.0, 0.0, 0.0, 1.0).unwrap();
    let mut rig = create_rig(&config);

    for _ in 0..51 {
        rig.coordinator
            .tick(&OperatorInput::new(1.0, 0.0, 0.0), PERIOD);
    }

    // The feedback lags the command by one tick
    assert!((rig.coordinator.pose().x - 3.95).abs() < 1e-6);
    assert!(rig.coordinator.pose().y.abs() < 1e-9);
    assert!(rig.telemetry.number("Drive/Pose/X").is_some());
}

#[test]
fn when_resetting_odometry_the_pose_should_be_replaced() {
    let mut rig = create_rig(&DriveConfig::default());
    rig.commands
        .send(DriveCommand::ResetOdometry {
            pose: Pose::new(4.0, 2.0, 1.0),
        })
        .unwrap();

    rig.coordinator.tick(&OperatorInput::default(), PERIOD);

    assert_eq!(Pose::new(4.0, 2.0, 1.0), rig.coordinator.pose());
}
