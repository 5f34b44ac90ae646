//! Shared fixtures.

use lockstep::EnvContext;

use crate::robot::{BODY_NAMES, JOINT_NAMES, PHYSICS_DT};
use crate::sim::{BipedSim, BipedSimCfg};

pub const TOL: f32 = 1e-5;

pub fn sim(num_envs: usize) -> BipedSim {
    BipedSim::new(num_envs, &BipedSimCfg::default()).expect("sim")
}

/// Bare context around a fresh simulation, for evaluating terms directly.
pub fn context(num_envs: usize) -> EnvContext<BipedSim> {
    EnvContext::new(sim(num_envs), 4, 20.0, 3)
}

pub fn joint(name: &str) -> usize {
    JOINT_NAMES
        .iter()
        .position(|&j| j == name)
        .unwrap_or_else(|| panic!("no joint {name}"))
}

pub fn body(name: &str) -> usize {
    BODY_NAMES
        .iter()
        .position(|&b| b == name)
        .unwrap_or_else(|| panic!("no body {name}"))
}

/// Physics substeps covering `seconds`.
pub fn substeps(seconds: f32) -> usize {
    (seconds / PHYSICS_DT).round() as usize
}
