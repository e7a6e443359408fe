use super::*;
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

fn tolerance() -> GoalTolerance {
    GoalTolerance {
        position: 0.05,
        heading: 0.05,
    }
}

fn create_navigator(translation: GainSet) -> PoseNavigator {
    let heading = GainSet::new(1.0, 0.0, 0.0, 0.0).unwrap();
    PoseNavigator::new(translation, heading, 3.0, 2.0, 1.0).unwrap()
}

fn proportional(kp: f64) -> GainSet {
    GainSet::new(kp, 0.0, 0.0, 0.0).unwrap()
}

#[test]
fn when_creating_a_navigator_with_a_zero_lookahead_it_should_error() {
    let gains = proportional(1.0);

    assert!(PoseNavigator::new(gains, gains, 0.0, 2.0, 1.0).is_err());
    assert!(PoseNavigator::new(gains, gains, 3.0, -2.0, 1.0).is_err());
}

#[test]
fn when_validating_a_zero_tolerance_it_should_error() {
    let tolerance = GoalTolerance {
        position: 0.0,
        heading: 0.1,
    };

    assert!(tolerance.validate().is_err());
}

#[test]
fn when_the_goal_is_within_the_lookahead_the_aim_point_should_be_the_goal() {
    let navigator = create_navigator(proportional(1.0));

    let aim = navigator.aim_point(&Pose::origin(), &Pose::new(2.0, 0.0, 0.0));

    assert_close(2.0, aim.x);
    assert_close(0.0, aim.y);
}

#[test]
fn when_the_goal_is_beyond_the_lookahead_the_aim_point_should_be_on_the_line_to_the_goal() {
    let navigator = create_navigator(proportional(1.0));

    let aim = navigator.aim_point(&Pose::new(1.0, 1.0, 0.0), &Pose::new(7.0, 9.0, 0.0));

    // The goal is 10 m away along (0.6, 0.8)
    assert_close(1.0 + 3.0 * 0.6, aim.x);
    assert_close(1.0 + 3.0 * 0.8, aim.y);
}

#[test]
fn when_there_is_no_goal_it_should_return_zero_velocity() {
    let mut navigator = create_navigator(proportional(1.0));

    let (velocity, reached) = navigator.advance(&Pose::origin(), None, 0.02);

    assert_eq!(ChassisVelocity::zero(), velocity);
    assert!(!reached);
    assert!(navigator.current_goal().is_none());
}

#[test]
fn when_driving_to_a_goal_it_should_move_along_the_line_to_the_goal() {
    let mut navigator = create_navigator(proportional(0.5));
    let goal = NavigationGoal::new(Pose::new(0.0, -2.0, 0.0), tolerance());

    let (velocity, reached) = navigator.advance(&Pose::origin(), Some(&goal), 0.02);

    assert!(!reached);
    assert_close(0.0, velocity.vx);
    assert_close(-1.0, velocity.vy);
    assert_close(0.0, velocity.omega);
    assert_eq!(goal.id(), navigator.current_goal());
}

#[test]
fn when_the_goal_is_far_away_the_speed_should_be_capped() {
    let mut navigator = create_navigator(proportional(10.0));
    let goal = NavigationGoal::new(Pose::new(20.0, 0.0, 0.0), tolerance());

    let (velocity, _) = navigator.advance(&Pose::origin(), Some(&goal), 0.02);

    assert_close(2.0, velocity.speed());
}

#[test]
fn when_the_heading_differs_across_the_wrap_it_should_turn_the_short_way() {
    let mut navigator = create_navigator(proportional(1.0));
    let goal = NavigationGoal::new(
        Pose::new(0.0, 0.0, -170.0_f64.to_radians()),
        tolerance(),
    );

    let (velocity, reached) = navigator.advance(
        &Pose::new(0.0, 0.0, 170.0_f64.to_radians()),
        Some(&goal),
        0.02,
    );

    assert!(!reached);
    assert_close(20.0_f64.to_radians(), velocity.omega);
    assert_close(0.0, velocity.speed());
}

#[test]
fn when_only_the_heading_is_within_tolerance_the_goal_should_not_be_reached() {
    let mut navigator = create_navigator(proportional(1.0));
    let goal = NavigationGoal::new(Pose::new(0.5, 0.0, 0.0), tolerance());

    let (velocity, reached) = navigator.advance(&Pose::origin(), Some(&goal), 0.02);

    assert!(!reached);
    assert!(velocity.speed() > 0.0);
}

#[test]
fn when_only_the_position_is_within_tolerance_the_goal_should_not_be_reached() {
    let mut navigator = create_navigator(proportional(1.0));
    let goal = NavigationGoal::new(Pose::new(0.01, 0.0, 0.5), tolerance());

    let (velocity, reached) = navigator.advance(&Pose::origin(), Some(&goal), 0.02);

    assert!(!reached);
    assert_close(0.5, velocity.omega);
}

#[test]
fn when_position_and_heading_are_within_tolerance_the_goal_should_be_reached() {
    let mut navigator = create_navigator(proportional(1.0));
    let goal = NavigationGoal::new(Pose::new(0.01, -0.02, 0.03), tolerance());

    let (velocity, reached) = navigator.advance(&Pose::origin(), Some(&goal), 0.02);

    assert!(reached);
    assert_eq!(ChassisVelocity::zero(), velocity);
}

#[test]
fn when_the_goal_changes_the_accumulated_state_should_be_cleared() {
    let mut navigator = create_navigator(GainSet::new(0.0, 1.0, 0.0, 0.0).unwrap());
    let target = Pose::new(2.0, 0.0, 0.0);
    let first = NavigationGoal::new(target, tolerance());

    let (velocity, _) = navigator.advance(&Pose::origin(), Some(&first), 0.02);
    assert_close(0.04, velocity.vx);
    let (velocity, _) = navigator.advance(&Pose::origin(), Some(&first), 0.02);
    assert_close(0.08, velocity.vx);

    let second = NavigationGoal::new(target, tolerance());
    let (velocity, _) = navigator.advance(&Pose::origin(), Some(&second), 0.02);
    assert_close(0.04, velocity.vx);
}

#[test]
fn when_the_goal_is_dropped_the_accumulated_state_should_be_cleared() {
    let mut navigator = create_navigator(GainSet::new(0.0, 1.0, 0.0, 0.0).unwrap());
    let goal = NavigationGoal::new(Pose::new(2.0, 0.0, 0.0), tolerance());

    navigator.advance(&Pose::origin(), Some(&goal), 0.02);
    navigator.advance(&Pose::origin(), None, 0.02);
    assert!(navigator.current_goal().is_none());

    let (velocity, _) = navigator.advance(&Pose::origin(), Some(&goal), 0.02);
    assert_close(0.04, velocity.vx);
}
