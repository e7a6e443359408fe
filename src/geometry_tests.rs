use super::*;
use float_cmp::{ApproxEq, F64Margin};
use std::f64::consts::PI;

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

// ModuleId

#[test]
fn when_indexing_module_ids_each_module_should_have_a_unique_slot() {
    for (i, id) in ModuleId::ALL.iter().enumerate() {
        assert_eq!(i, id.index());
    }
}

#[test]
fn when_displaying_a_module_id_it_should_write_out_the_module_name() {
    assert_eq!("RearRight", format!("{}", ModuleId::RearRight));
}

// Pose

#[test]
fn when_creating_a_pose_the_heading_should_be_wrapped() {
    let pose = Pose::new(1.0, 2.0, 1.5 * PI);

    assert_eq!(1.0, pose.x);
    assert_eq!(2.0, pose.y);
    assert_close(-0.5 * PI, pose.heading);
}

#[test]
fn when_moving_straight_the_pose_should_advance_along_the_heading() {
    let pose = Pose::new(1.0, 1.0, 0.5 * PI);
    let moved = pose.exp(2.0, 0.0, 0.0);

    assert_close(1.0, moved.x);
    assert_close(3.0, moved.y);
    assert_close(0.5 * PI, moved.heading);
}

#[test]
fn when_driving_a_quarter_circle_the_pose_should_end_on_the_arc() {
    // Forward at 1 m/s while turning at 1 rad/s traces a circle with radius 1
    let pose = Pose::origin();
    let moved = pose.exp(0.5 * PI, 0.0, 0.5 * PI);

    assert_close(1.0, moved.x);
    assert_close(1.0, moved.y);
    assert_close(0.5 * PI, moved.heading);
}

// ChassisVelocity

#[test]
fn when_converting_between_frames_the_round_trip_should_restore_the_velocity() {
    let field = ChassisVelocity::new(1.0, 0.0, 0.3);
    let robot = field.field_to_robot(0.5 * PI);

    assert_close(0.0, robot.vx);
    assert_close(-1.0, robot.vy);
    assert_close(0.3, robot.omega);

    let back = robot.robot_to_field(0.5 * PI);
    assert_close(1.0, back.vx);
    assert_close(0.0, back.vy);
}

#[test]
fn when_scaling_a_velocity_translation_and_rotation_should_scale_independently() {
    let velocity = ChassisVelocity::new(3.0, 4.0, 2.0).scaled(0.5, 1.0);

    assert_close(2.5, velocity.speed());
    assert_close(2.0, velocity.omega);
}

// ModuleState

#[test]
fn when_getting_the_module_velocity_it_should_point_along_the_wheel() {
    let state = ModuleState::new(2.0, 0.5 * PI);
    let velocity = state.velocity();

    assert_close(0.0, velocity.x);
    assert_close(2.0, velocity.y);
}
