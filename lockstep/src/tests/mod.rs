//! Behavioral tests for the lockstep runtime.
//!
//! Every suite drives a full [`ManagerBasedRlEnv`](crate::ManagerBasedRlEnv)
//! over the deterministic [`common::TestSim`].
//!
//! ## Organization
//!
//! - `common`: test simulation, test term set and config builders
//! - `observation_tests`: shaping order, delay, history and concatenation
//! - `event_tests`: startup, reset and interval scheduling
//! - `reward_tests`: weighted sums and episode logging
//! - `termination_tests`: termination versus time-out aggregation
//! - `env_tests`: step loop, resets, configuration and determinism
//! - `property_tests`: proptest invariants across random configurations

pub mod common;
pub mod event_tests;
pub mod termination_tests;
