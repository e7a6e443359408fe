use super::*;
use crate::hardware::actuator_interface::SimulatedActuator;
use float_cmp::{ApproxEq, F64Margin};

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

fn drive_config(kp: f64, kf: f64) -> ModuleConfig {
    ModuleConfig {
        gains: GainSet::new(kp, 0.0, 0.0, kf).unwrap(),
        ..ModuleConfig::default()
    }
}

fn steer_config(soft_limits: Option<SoftLimits>) -> ModuleConfig {
    ModuleConfig {
        gains: GainSet::new(1.0, 0.0, 0.0, 0.0).unwrap(),
        soft_limits,
        ..ModuleConfig::default()
    }
}

fn create_controller(
    drive: ModuleConfig,
    steer: ModuleConfig,
) -> (ModuleController, SimulatedActuator) {
    let controller = ModuleController::new(ModuleId::FrontLeft, drive, steer, 3).unwrap();
    (controller, SimulatedActuator::new())
}

fn move_to_angle(
    controller: &mut ModuleController,
    actuator: &mut SimulatedActuator,
    angle: f64,
) {
    actuator.set_position_setpoint(ModuleId::FrontLeft, angle);
    controller.refresh_feedback(actuator);
}

#[test]
fn test_new_instance() {
    let (controller, _) = create_controller(drive_config(0.5, 1.0), steer_config(None));

    assert_eq!(ModuleId::FrontLeft, controller.id());
    assert_eq!(ModuleState::default(), controller.state());
    assert_eq!(ModuleState::default(), controller.target());
    assert_eq!(TargetOutcome::Accepted, controller.outcome());
    assert!(!controller.is_degraded());
    assert!(!controller.at_target());
}

#[test]
fn when_creating_a_controller_with_a_zero_stale_window_it_should_error() {
    let result = ModuleController::new(
        ModuleId::RearLeft,
        drive_config(0.5, 1.0),
        steer_config(None),
        0,
    );

    assert!(result.is_err());
}

#[test]
fn when_creating_a_controller_with_an_inverted_limit_window_it_should_error() {
    let limits = SoftLimits {
        lower: 1.0,
        upper: -1.0,
        enabled: true,
    };

    let result = ModuleController::new(
        ModuleId::RearLeft,
        drive_config(0.5, 1.0),
        steer_config(Some(limits)),
        3,
    );

    match result {
        Err(Error::InvalidConfiguration { reason: _ }) => {}
        _ => panic!("Expected an invalid configuration error"),
    }
}

#[test]
fn when_creating_a_controller_with_disabled_inverted_limits_it_should_succeed() {
    let limits = SoftLimits {
        lower: 1.0,
        upper: -1.0,
        enabled: false,
    };

    let result = ModuleController::new(
        ModuleId::RearLeft,
        drive_config(0.5, 1.0),
        steer_config(Some(limits)),
        3,
    );

    assert!(result.is_ok());
}

#[test]
fn when_setting_a_target_across_the_wrap_it_should_steer_the_short_way() {
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.5, 1.0), steer_config(None));
    move_to_angle(&mut controller, &mut actuator, -179.0_f64.to_radians());

    let outcome = controller.set_target(1.0, 179.0_f64.to_radians());

    assert_eq!(TargetOutcome::Accepted, outcome);
    assert_close(-2.0_f64.to_radians(), controller.angle_error());
    assert_close(1.0, controller.target().speed);
}

#[test]
fn when_setting_a_target_more_than_a_quarter_turn_away_it_should_reverse_the_wheel() {
    let (mut controller, _) = create_controller(drive_config(0.5, 1.0), steer_config(None));

    controller.set_target(1.5, 0.75 * PI);

    assert_close(-1.5, controller.target().speed);
    assert_close(-0.25 * PI, controller.target().angle);
}

#[test]
fn when_setting_a_target_exactly_a_quarter_turn_away_it_should_not_reverse_the_wheel() {
    let (mut controller, _) = create_controller(drive_config(0.5, 1.0), steer_config(None));

    controller.set_target(1.5, 0.5 * PI);

    assert_close(1.5, controller.target().speed);
    assert_close(0.5 * PI, controller.target().angle);
}

#[test]
fn when_the_short_way_leaves_the_soft_limits_it_should_pick_the_closest_angle_inside() {
    let limits = SoftLimits {
        lower: -PI,
        upper: PI,
        enabled: true,
    };
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.5, 1.0), steer_config(Some(limits)));
    move_to_angle(&mut controller, &mut actuator, 3.0);

    let outcome = controller.set_target(1.0, -3.0);

    assert_eq!(TargetOutcome::Accepted, outcome);
    assert_close(PI - 3.0, controller.target().angle);
    assert_close(-1.0, controller.target().speed);
}

#[test]
fn when_the_reversed_angle_is_inside_the_soft_limits_it_should_be_accepted() {
    let limits = SoftLimits {
        lower: -0.5 * PI,
        upper: 0.5 * PI,
        enabled: true,
    };
    let (mut controller, _) =
        create_controller(drive_config(0.5, 1.0), steer_config(Some(limits)));

    let outcome = controller.set_target(1.0, PI);

    assert_eq!(TargetOutcome::Accepted, outcome);
    assert_close(0.0, controller.target().angle);
    assert_close(-1.0, controller.target().speed);
}

#[test]
fn when_no_equivalent_angle_is_inside_the_soft_limits_it_should_hold_the_nearest_limit() {
    let limits = SoftLimits {
        lower: 0.1,
        upper: 0.3,
        enabled: true,
    };
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.5, 1.0), steer_config(Some(limits)));
    move_to_angle(&mut controller, &mut actuator, 0.2);

    let outcome = controller.set_target(1.0, -1.0);

    assert_eq!(TargetOutcome::HeldAtLimit, outcome);
    assert_eq!(TargetOutcome::HeldAtLimit, controller.outcome());
    assert_close(0.1, controller.target().angle);
    assert_eq!(0.0, controller.target().speed);

    let outcome = controller.set_target(1.0, 0.25);
    assert_eq!(TargetOutcome::Accepted, outcome);
}

#[test]
fn when_applying_it_should_send_the_closed_loop_outputs_to_the_actuator() {
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.5, 1.0), steer_config(None));

    controller.set_target(2.0, 0.5);
    controller.apply(&mut actuator, 0.02);

    // 0.5 * (2.0 - 0.0) + 1.0 * 2.0
    assert_close(3.0, actuator.velocity_setpoint(ModuleId::FrontLeft));
    assert_close(3.0, controller.commanded_speed());
    assert_close(0.5, actuator.position_setpoint(ModuleId::FrontLeft));
}

#[test]
fn when_the_drive_is_inverted_it_should_negate_the_output_and_the_feedback() {
    let drive = ModuleConfig {
        inverted: true,
        ..drive_config(0.0, 1.0)
    };
    let (mut controller, mut actuator) = create_controller(drive, steer_config(None));

    controller.set_target(2.0, 0.0);
    controller.apply(&mut actuator, 0.02);
    assert_close(-2.0, actuator.velocity_setpoint(ModuleId::FrontLeft));

    controller.refresh_feedback(&actuator);
    assert_close(2.0, controller.state().speed);
}

#[test]
fn when_the_sensor_phase_is_set_it_should_negate_the_feedback_only() {
    let steer = ModuleConfig {
        sensor_phase: true,
        ..steer_config(None)
    };
    let (mut controller, mut actuator) = create_controller(drive_config(0.5, 1.0), steer);

    move_to_angle(&mut controller, &mut actuator, 0.4);
    assert_close(-0.4, controller.state().angle);

    controller.set_target(0.0, -0.4);
    controller.apply(&mut actuator, 0.02);
    assert_close(-0.4, actuator.position_setpoint(ModuleId::FrontLeft));
}

#[test]
fn when_the_module_reaches_its_target_it_should_report_at_target() {
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.0, 1.0), steer_config(None));

    controller.set_target(1.0, 0.3);
    controller.apply(&mut actuator, 0.02);
    assert!(!controller.at_target());

    controller.refresh_feedback(&actuator);
    controller.apply(&mut actuator, 0.02);
    assert!(controller.at_target());
    assert_close(0.0, controller.angle_error());
}

#[test]
fn when_feedback_is_stale_it_should_hold_the_last_state_and_degrade_after_the_window() {
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.5, 1.0), steer_config(None));
    move_to_angle(&mut controller, &mut actuator, 0.6);
    assert!(controller.has_fresh_feedback());

    actuator.set_feedback_available(ModuleId::FrontLeft, false);
    actuator.set_position_setpoint(ModuleId::FrontLeft, 1.2);

    controller.refresh_feedback(&actuator);
    assert!(!controller.has_fresh_feedback());
    controller.refresh_feedback(&actuator);
    assert!(!controller.is_degraded());
    assert_close(0.6, controller.state().angle);

    controller.refresh_feedback(&actuator);
    assert!(controller.is_degraded());
    assert_close(0.6, controller.state().angle);

    actuator.set_feedback_available(ModuleId::FrontLeft, true);
    controller.refresh_feedback(&actuator);
    assert!(!controller.is_degraded());
    assert!(controller.has_fresh_feedback());
    assert_close(1.2, controller.state().angle);
}

#[test]
fn when_resetting_the_loops_it_should_no_longer_be_at_target() {
    let (mut controller, mut actuator) =
        create_controller(drive_config(0.0, 1.0), steer_config(None));
    controller.apply(&mut actuator, 0.02);
    assert!(controller.at_target());

    controller.reset();

    assert!(!controller.at_target());
}
