//! Task term tests against hand-set simulation state.
//!
//! These tests define:
//! - How every term picks the raised leg from the standing-leg scratch entry
//! - Reward shapes and their parameter validation
//! - Standing-leg randomization on reset

use lockstep::{
    ConfigError, EnvContext, EnvIds, EventTerm, ObservationTerm, OrderedMap, RewardTerm,
    SceneEntityCfg, TerminationTerm,
};

use super::common::*;
use crate::mdp::*;
use crate::robot::{posture_std, ANKLE_HEIGHT, FOOT_CONTACT_SENSORS, ROBOT};
use crate::sim::BipedSim;

fn set_standing(ctx: &mut EnvContext<BipedSim>, legs: &[i64]) {
    let column = ctx.extras.get_or_insert(&STANDING_LEG).expect("scratch");
    for (i, &leg) in legs.iter().enumerate() {
        column[i] = leg;
    }
}

fn set_body_height(ctx: &mut EnvContext<BipedSim>, env: usize, name: &str, z: f32) {
    ctx.sim.robot_mut().data.body_link_pos_w[[env, body(name), 2]] = z;
}

fn set_contacts(ctx: &mut EnvContext<BipedSim>, env: usize, left: bool, right: bool) {
    let sensors = &mut ctx.sim.robot_mut().data.sensor_data;
    for (sensor, down) in FOOT_CONTACT_SENSORS.iter().zip([left, right]) {
        if let Some(readings) = sensors.get_mut(*sensor) {
            readings[[env, 0]] = if down { 1.0 } else { 0.0 };
        }
    }
}

// ============================================================================
// Observations
// ============================================================================

#[test]
fn should_default_to_left_leg_before_first_draw() {
    let ctx = context(2);

    let obs = StandingLegIndicator.compute(&ctx).expect("obs");

    assert_eq!(obs, ndarray::array![[1.0, 0.0], [1.0, 0.0]]);
}

#[test]
fn should_encode_standing_leg_one_hot() {
    let mut ctx = context(3);
    set_standing(&mut ctx, &[LEFT as i64, RIGHT as i64, LEFT as i64]);

    let obs = StandingLegIndicator.compute(&ctx).expect("obs");

    assert_eq!(obs, ndarray::array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
}

#[test]
fn should_report_knee_height_of_raised_leg() {
    let mut ctx = context(2);
    set_standing(&mut ctx, &[LEFT as i64, RIGHT as i64]);
    for env in 0..2 {
        set_body_height(&mut ctx, env, "left_knee_link", 0.30);
        set_body_height(&mut ctx, env, "right_knee_link", 0.55);
    }
    let mut term = RaisedKneeHeight::new(&ctx.sim).expect("term");

    let obs = term.compute(&ctx).expect("obs");

    assert_eq!(obs.column(0).to_vec(), vec![0.55, 0.30]);
}

// ============================================================================
// Rewards
// ============================================================================

#[test]
fn should_reward_knee_above_threshold_exponentially() {
    let mut ctx = context(2);
    set_body_height(&mut ctx, 0, "right_knee_link", 0.5);
    set_body_height(&mut ctx, 1, "right_knee_link", 3.0);
    let mut term = KneeHeightAboveThreshold::new(0.4, 0.5, &ctx.sim).expect("term");

    let reward = term.compute(&ctx).expect("reward");

    assert!((reward[0] - (0.1f32 / 0.25).exp()).abs() < 1e-4);
    assert!((reward[1] - 2.0f32.exp()).abs() < 1e-4, "error clamps at 0.5");
    assert!(KneeHeightAboveThreshold::new(0.4, 0.0, &ctx.sim).is_err());
}

#[test]
fn should_reward_upright_base_fully() {
    let mut ctx = context(2);
    ctx.sim.robot_mut().data.projected_gravity_b[[1, 2]] = -0.75;

    let reward = UprightPosture.compute(&ctx).expect("reward");

    assert!((reward[0] - 1.0).abs() < TOL);
    assert!((reward[1] - (-1.0f32).exp()).abs() < TOL);
}

#[test]
fn should_penalize_all_angular_velocity_axes() {
    let mut ctx = context(1);
    ctx.sim
        .robot_mut()
        .data
        .root_link_ang_vel_b
        .row_mut(0)
        .assign(&ndarray::array![1.0, 2.0, 2.0]);

    let penalty = BaseStability.compute(&ctx).expect("reward");

    assert_eq!(penalty.to_vec(), vec![9.0]);
}

#[test]
fn should_score_posture_against_per_joint_tolerance() {
    let mut ctx = context(2);
    let all = SceneEntityCfg::new(ROBOT).with_joints([".*"]);
    let mut term = JointPosture::new(&all, &posture_std(), &ctx.sim).expect("term");
    for side in ["left", "right"] {
        ctx.sim.robot_mut().data.joint_pos[[1, joint(&format!("{side}_knee_joint"))]] += 0.5;
    }

    let reward = term.compute(&ctx).expect("reward");

    assert!((reward[0] - 1.0).abs() < TOL, "default pose scores 1");
    let expected = (-2.0f32 / 29.0).exp();
    assert!((reward[1] - expected).abs() < 1e-5, "{} vs {expected}", reward[1]);
}

#[test]
fn should_require_tolerance_for_every_selected_joint() {
    let ctx = context(1);
    let legs = SceneEntityCfg::new(ROBOT).with_joints([".*_knee_joint", ".*_hip_pitch_joint"]);
    let mut knees_only = OrderedMap::new();
    knees_only.insert(".*_knee_joint", 0.5);

    assert!(matches!(
        JointPosture::new(&legs, &knees_only, &ctx.sim),
        Err(ConfigError::InvalidConfig { .. })
    ));

    let mut bad = OrderedMap::new();
    bad.insert(".*", 0.0);
    assert!(JointPosture::new(&legs, &bad, &ctx.sim).is_err());
}

#[test]
fn should_score_raised_foot_height_piecewise() {
    let ctx = context(1);
    let term = RaisedFootHeightOptimalRange::new(0.10, 0.25, 0.40, &ctx.sim).expect("term");

    assert_eq!(term.score(0.05), 0.0);
    assert!((term.score(0.175) - 0.5).abs() < 1e-5);
    assert_eq!(term.score(0.25), 1.0);
    assert_eq!(term.score(0.40), 1.0);
    assert!(term.score(0.55).abs() < 1e-5);
    assert_eq!(term.score(2.0), -1.0);
}

#[test]
fn should_measure_height_of_raised_sole() {
    let mut ctx = context(2);
    set_standing(&mut ctx, &[LEFT as i64, RIGHT as i64]);
    for env in 0..2 {
        set_body_height(&mut ctx, env, "right_ankle_roll_link", ANKLE_HEIGHT + 0.30);
    }
    let mut term = RaisedFootHeightOptimalRange::new(0.10, 0.25, 0.40, &ctx.sim).expect("term");

    let reward = term.compute(&ctx).expect("reward");

    assert_eq!(reward[0], 1.0, "right foot raised into the band");
    assert_eq!(reward[1], 0.0, "left foot still on the ground");
}

#[test]
fn should_reject_unordered_height_band() {
    let ctx = context(1);

    assert!(RaisedFootHeightOptimalRange::new(0.3, 0.25, 0.40, &ctx.sim).is_err());
    assert!(RaisedFootHeightOptimalRange::new(0.1, 0.40, 0.40, &ctx.sim).is_err());
}

#[test]
fn should_reward_clearance_only_with_standing_foot_down() {
    let mut ctx = context(4);
    set_standing(&mut ctx, &[LEFT as i64, LEFT as i64, RIGHT as i64, LEFT as i64]);
    set_contacts(&mut ctx, 0, true, false);
    set_contacts(&mut ctx, 1, true, true);
    set_contacts(&mut ctx, 2, true, false);
    set_contacts(&mut ctx, 3, false, false);

    let reward = FootClearance.compute(&ctx).expect("reward");

    assert_eq!(reward.to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
}

#[test]
fn should_penalize_horizontal_base_speed() {
    let mut ctx = context(1);
    ctx.sim
        .robot_mut()
        .data
        .root_link_lin_vel_b
        .row_mut(0)
        .assign(&ndarray::array![3.0, 4.0, 10.0]);

    let penalty = StaticStancePenalty.compute(&ctx).expect("reward");

    assert_eq!(penalty.to_vec(), vec![25.0]);
}

// ============================================================================
// Termination and event
// ============================================================================

#[test]
fn should_terminate_when_raised_foot_touches_down() {
    let mut ctx = context(3);
    set_standing(&mut ctx, &[LEFT as i64, RIGHT as i64, RIGHT as i64]);
    set_contacts(&mut ctx, 0, true, true);
    set_contacts(&mut ctx, 1, false, true);
    set_contacts(&mut ctx, 2, true, true);

    let done = RaisedFootContact.compute(&ctx).expect("done");

    assert_eq!(done.to_vec(), vec![true, false, true]);
}

#[test]
fn should_redraw_standing_leg_only_for_reset_envs() {
    let mut ctx = context(64);
    set_standing(&mut ctx, &[7; 64]);
    let subset: Vec<usize> = (0..32).collect();

    RandomizeStandingLeg
        .apply(&mut ctx, &EnvIds::from_indices(64, &subset))
        .expect("event");

    let legs = ctx.extras.read(&STANDING_LEG).expect("scratch");
    assert!(legs.iter().take(32).all(|&l| l == 0 || l == 1));
    assert!(legs.iter().take(32).any(|&l| l == 0) && legs.iter().take(32).any(|&l| l == 1));
    assert!(legs.iter().skip(32).all(|&l| l == 7));
}
