//! Tests for the balancing task.
//!
//! ## Organization
//!
//! - `sim_tests`: kinematic stand-in, ground contact and joint tracking
//! - `mdp_tests`: standing-leg aware terms evaluated against hand-set state
//! - `config_tests`: presets and serialized configuration
//! - `env_tests`: the assembled environment end to end

pub mod common;
pub mod mdp_tests;
