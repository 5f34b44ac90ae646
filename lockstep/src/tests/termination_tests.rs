//! Termination aggregation tests.
//!
//! These tests define:
//! - Separation of terminal states from time limits
//! - Resets triggered by either kind
//! - Per-term episode counts in the reset log

use super::common::*;
use crate::EnvIds;

fn step_zero(env: &mut TestEnv) -> crate::StepOutput {
    let actions = zero_actions(env);
    env.step(actions.view()).expect("step")
}

#[test]
fn should_report_terminated_and_time_out_for_same_env() {
    let cfg = with_done(base_cfg(), "fell", TestDone::Envs { ids: vec![3] }, false);
    let cfg = with_done(cfg, "limit", TestDone::Envs { ids: vec![3] }, true);
    let mut env = make_env(&cfg, 5);
    env.reset().expect("reset");

    let out = step_zero(&mut env);

    let expected: Vec<bool> = (0..5).map(|i| i == 3).collect();
    assert_eq!(out.terminated.to_vec(), expected);
    assert_eq!(out.time_outs.to_vec(), expected);
    assert_eq!(out.dones.to_vec(), expected);
    assert_eq!(out.info.time_outs, out.time_outs);
    assert_eq!(out.info.reset_env_ids, vec![3]);
}

#[test]
fn should_zero_episode_length_of_done_envs_only() {
    let cfg = with_done(base_cfg(), "fell", TestDone::Envs { ids: vec![1] }, false);
    let mut env = make_env(&cfg, 3);
    env.reset().expect("reset");

    step_zero(&mut env);
    step_zero(&mut env);

    assert_eq!(env.context().episode_length_buf.to_vec(), vec![2, 0, 2]);
}

#[test]
fn should_time_out_at_max_episode_length() {
    let mut cfg = with_done(base_cfg(), "time_out", TestDone::TimeOut, true);
    cfg.episode_length_s = 1.0;
    let mut env = make_env(&cfg, 2);
    env.reset().expect("reset");
    assert_eq!(env.max_episode_length(), 4);

    for _ in 0..3 {
        let out = step_zero(&mut env);
        assert!(!out.dones.iter().any(|&d| d));
    }
    let out = step_zero(&mut env);

    assert_eq!(out.time_outs.to_vec(), vec![true, true]);
    assert_eq!(out.terminated.to_vec(), vec![false, false]);
    assert_eq!(env.context().episode_length_buf.to_vec(), vec![0, 0]);
}

#[test]
fn should_log_episode_termination_counts_per_term() {
    let cfg = with_done(base_cfg(), "early", TestDone::Envs { ids: vec![0, 2] }, false);
    let cfg = with_done(cfg, "late", TestDone::AfterSteps { steps: 10 }, true);
    let mut env = make_env(&cfg, 4);
    env.reset().expect("reset");

    let out = step_zero(&mut env);

    assert_eq!(out.info.log.get("Episode_Termination/early"), Some(&2.0));
    assert_eq!(out.info.log.get("Episode_Termination/late"), Some(&0.0));
    assert_eq!(
        env.termination_manager().term_dones("early").map(|d| d.to_vec()),
        Some(vec![true, false, true, false])
    );
}

#[test]
fn should_report_no_dones_without_terms() {
    let mut env = make_env(&base_cfg(), 3);
    env.reset().expect("reset");

    let out = step_zero(&mut env);

    assert!(out.dones.iter().all(|&d| !d));
    assert!(out.info.reset_env_ids.is_empty());
    assert!(out.info.log.is_empty());
}

#[test]
fn should_count_only_reset_subset_in_log() {
    let cfg = with_done(base_cfg(), "fell", TestDone::Envs { ids: vec![0] }, false);
    let mut env = make_env(&cfg, 3);
    env.reset().expect("reset");
    step_zero(&mut env);

    let others = env
        .reset_idx(&EnvIds::from_indices(3, &[1, 2]))
        .expect("reset_idx");
    let fallen = env
        .reset_idx(&EnvIds::from_indices(3, &[0]))
        .expect("reset_idx");

    assert_eq!(others.get("Episode_Termination/fell"), Some(&0.0));
    assert_eq!(fallen.get("Episode_Termination/fell"), Some(&1.0));
}
