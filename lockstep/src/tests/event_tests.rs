//! Event scheduling tests.
//!
//! The test simulation steps at 0.25 s per environment step, so interval
//! countdowns in multiples of 0.25 s elapse on exact step boundaries.

use super::common::*;
use crate::error::{ConfigError, EnvError, ManagerKind};
use crate::managers::{EventMode, EventTermCfg};
use crate::mdp::AxisRanges;
use crate::EnvIds;

fn run_steps(env: &mut TestEnv, steps: usize) {
    let actions = zero_actions(env);
    for _ in 0..steps {
        env.step(actions.view()).expect("step");
    }
}

// ============================================================================
// Startup and reset modes
// ============================================================================

#[test]
fn should_fire_startup_events_once_at_construction() {
    let cfg = with_event(base_cfg(), "boot", EventTermCfg::startup(count_event("boot")));
    let mut env = make_env(&cfg, 3);

    assert_eq!(counts(&env, "boot"), vec![1.0, 1.0, 1.0]);

    env.reset().expect("reset");
    run_steps(&mut env, 4);
    env.reset_idx(&EnvIds::from_indices(3, &[2])).expect("reset_idx");

    assert_eq!(counts(&env, "boot"), vec![1.0, 1.0, 1.0]);
}

#[test]
fn should_fire_reset_events_only_for_reset_envs() {
    let cfg = with_event(base_cfg(), "on_reset", EventTermCfg::reset(count_event("on_reset")));
    let mut env = make_env(&cfg, 3);
    assert_eq!(counts(&env, "on_reset"), vec![0.0, 0.0, 0.0]);

    env.reset().expect("reset");
    assert_eq!(counts(&env, "on_reset"), vec![1.0, 1.0, 1.0]);

    env.reset_idx(&EnvIds::from_indices(3, &[1])).expect("reset_idx");
    assert_eq!(counts(&env, "on_reset"), vec![1.0, 2.0, 1.0]);
}

#[test]
fn should_rate_limit_reset_events_by_step_count() {
    let cfg = with_event(
        base_cfg(),
        "on_reset",
        EventTermCfg::reset(count_event("on_reset")).with_min_step_count_between_reset(5),
    );
    let mut env = make_env(&cfg, 2);
    let first = EnvIds::from_indices(2, &[0]);

    env.reset_idx(&first).expect("reset_idx");
    assert_eq!(counts(&env, "on_reset"), vec![1.0, 0.0], "first trigger always fires");

    env.reset_idx(&first).expect("reset_idx");
    assert_eq!(counts(&env, "on_reset"), vec![1.0, 0.0], "suppressed within 5 steps");

    run_steps(&mut env, 5);
    env.reset_idx(&first).expect("reset_idx");
    assert_eq!(counts(&env, "on_reset"), vec![2.0, 0.0]);
}

#[test]
fn should_randomize_root_pose_within_range_on_reset() {
    let cfg = with_event(
        base_cfg(),
        "reset_base",
        EventTermCfg::reset(TestEvent::ResetRoot {
            pose_range: AxisRanges::default().with_x(-0.5, 0.5).with_yaw(-3.0, 3.0),
        }),
    );
    let mut env = make_env(&cfg, 16);

    env.reset().expect("reset");

    let data = &env.sim().robot().data;
    let xs = data.root_link_pos_w.column(0);
    assert!(xs.iter().all(|x| x.abs() <= 0.5), "x offsets in range: {xs}");
    assert!(xs.iter().any(|&x| x != xs[0]), "offsets differ across envs");
    assert!(data.root_link_pos_w.column(2).iter().all(|&z| z == 1.0));
    for q in data.root_link_quat_w.rows() {
        let norm = q.dot(&q).sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "unit quaternion: {q}");
    }
}

// ============================================================================
// Interval mode
// ============================================================================

#[test]
fn should_fire_interval_events_on_schedule() {
    let cfg = with_event(
        base_cfg(),
        "tick",
        EventTermCfg::interval(count_event("tick"), 1.0, 1.0),
    );
    let mut env = make_env(&cfg, 2);
    env.reset().expect("reset");

    run_steps(&mut env, 3);
    assert_eq!(counts(&env, "tick"), vec![0.0, 0.0]);

    run_steps(&mut env, 1);
    assert_eq!(counts(&env, "tick"), vec![1.0, 1.0]);
    assert_eq!(last_fired(&env, "tick"), vec![4, 4]);

    run_steps(&mut env, 8);
    assert_eq!(counts(&env, "tick"), vec![3.0, 3.0]);
    assert_eq!(last_fired(&env, "tick"), vec![12, 12]);
}

#[test]
fn should_keep_one_countdown_for_global_time() {
    let cfg = with_event(
        base_cfg(),
        "push",
        EventTermCfg::interval(count_event("push"), 0.5, 2.0).with_global_time(),
    );
    let mut env = make_env(&cfg, 5);

    let time_left = env.event_manager().interval_time_left("push").expect("timer");
    assert_eq!(time_left.len(), 1);

    env.reset().expect("reset");
    run_steps(&mut env, 20);

    let fired = counts(&env, "push");
    assert!(fired[0] > 0.0, "global interval fired within 5 s");
    assert!(
        fired.iter().all(|&c| c == fired[0]),
        "every env fires together: {fired:?}"
    );
}

#[test]
fn should_redraw_countdowns_only_for_reset_envs() {
    let cfg = with_event(
        base_cfg(),
        "push",
        EventTermCfg::interval(count_event("push"), 5.0, 10.0),
    );
    let mut env = make_env(&cfg, 4);
    env.reset().expect("reset");
    run_steps(&mut env, 2);

    let before = env
        .event_manager()
        .interval_time_left("push")
        .expect("timer")
        .clone();
    env.reset_idx(&EnvIds::from_indices(4, &[2])).expect("reset_idx");
    let after = env.event_manager().interval_time_left("push").expect("timer");

    for i in [0, 1, 3] {
        assert_eq!(after[i], before[i], "env {i} countdown is untouched");
    }
    assert!((5.0..=10.0).contains(&after[2]), "fresh draw: {}", after[2]);
}

#[test]
fn should_suppress_interval_events_until_guard_elapses() {
    let cfg = with_event(
        base_cfg(),
        "tick",
        EventTermCfg::interval(count_event("tick"), 0.25, 0.25).with_min_step_count_between_reset(3),
    );
    let mut env = make_env(&cfg, 2);
    env.reset().expect("reset");

    run_steps(&mut env, 5);
    assert_eq!(counts(&env, "tick"), vec![3.0, 3.0], "fires at steps 3, 4 and 5");

    env.reset_idx(&EnvIds::from_indices(2, &[0])).expect("reset_idx");
    run_steps(&mut env, 3);

    assert_eq!(counts(&env, "tick"), vec![4.0, 6.0]);
    assert_eq!(last_fired(&env, "tick"), vec![8, 8]);
}

#[test]
fn should_redraw_countdown_even_when_guard_suppresses_firing() {
    let cfg = with_event(
        base_cfg(),
        "tick",
        EventTermCfg::interval(count_event("tick"), 1.0, 1.0).with_min_step_count_between_reset(100),
    );
    let mut env = make_env(&cfg, 1);
    env.reset().expect("reset");

    run_steps(&mut env, 4);

    assert_eq!(counts(&env, "tick"), vec![0.0]);
    let time_left = env.event_manager().interval_time_left("tick").expect("timer");
    assert_eq!(time_left[0], 1.0);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn should_list_terms_by_mode_in_declaration_order() {
    let mut cfg = with_event(base_cfg(), "b_reset", EventTermCfg::reset(count_event("b")));
    cfg = with_event(cfg, "a_boot", EventTermCfg::startup(count_event("a")));
    cfg = with_event(cfg, "c_reset", EventTermCfg::reset(count_event("c")));
    let env = make_env(&cfg, 1);
    let events = env.event_manager();

    assert_eq!(events.available_modes(), vec![EventMode::Reset, EventMode::Startup]);
    assert_eq!(events.active_terms(EventMode::Reset), vec!["b_reset", "c_reset"]);
    assert_eq!(events.active_terms(EventMode::Startup), vec!["a_boot"]);
    assert!(events.active_terms(EventMode::Interval).is_empty());
}

#[test]
fn should_require_interval_range_for_interval_mode() {
    let mut term = EventTermCfg::interval(count_event("tick"), 1.0, 2.0);
    term.interval_range_s = None;
    let cfg = with_event(base_cfg(), "tick", term);

    match build_err(&cfg, 1) {
        EnvError::Config(ConfigError::Term { manager, term, source }) => {
            assert_eq!(manager, ManagerKind::Event);
            assert_eq!(term, "tick");
            assert!(matches!(*source, ConfigError::MissingParameter(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn should_reject_interval_range_outside_interval_mode() {
    let mut term = EventTermCfg::reset(count_event("on_reset"));
    term.interval_range_s = Some((1.0, 2.0));
    let cfg = with_event(base_cfg(), "on_reset", term);

    assert!(matches!(
        build_err(&cfg, 1),
        EnvError::Config(ConfigError::Term { .. })
    ));
}

#[test]
fn should_reject_inverted_interval_range() {
    let cfg = with_event(
        base_cfg(),
        "tick",
        EventTermCfg::interval(count_event("tick"), 2.0, 1.0),
    );

    assert!(matches!(
        build_err(&cfg, 1),
        EnvError::Config(ConfigError::Term { .. })
    ));
}
