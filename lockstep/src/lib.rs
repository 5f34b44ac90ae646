//! # lockstep
//!
//! Term-scheduling and observation-shaping engine for batched,
//! manager-based reinforcement-learning environments.
//!
//! A task is described declaratively as ordered, named terms grouped by
//! manager: observations, actions, events, rewards and terminations. Each term
//! names a function from a closed per-task enum plus parameters. The runtime
//! resolves every term once at construction, then steps `N` environments in
//! lockstep over flat `ndarray` buffers with per-environment reset.
//!
//! ## Modules
//!
//! - [`managers`]: term registry and the five managers
//! - [`buffers`]: rolling history and stochastic delay buffers
//! - [`noise`]: observation corruption models
//! - [`scene`]: the simulation interface terms read from
//! - [`extras`]: typed cross-term scratch state
//! - [`mdp`]: reusable terms for articulated robots
//! - [`env`]: the batched environment and its step loop
//!
//! ## Feature Flags
//!
//! - `parallel`: row-parallel buffer gathers through rayon

pub mod buffers;
pub mod context;
pub mod env;
pub mod env_ids;
pub mod error;
pub mod extras;
pub mod managers;
pub mod math;
pub mod mdp;
pub mod noise;
pub mod ordered;
pub mod rng;
pub mod scene;
pub mod string;

pub use context::EnvContext;
pub use env::{EnvCfg, ManagerBasedRlEnv, StepInfo, StepOutput, TermSet};
pub use env_ids::EnvIds;
pub use error::{ConfigError, EnvError, EvalError, ManagerKind};
pub use extras::{Extras, ScratchKey, ScratchReset, ScratchValue};
pub use managers::{
    ActionTerm, ActionTermCfg, EventMode, EventTerm, EventTermCfg, GroupObs, ObservationCfg,
    ObservationGroupCfg, ObservationTerm, ObservationTermCfg, Observations, ResolveTerm,
    RewardTerm, RewardTermCfg, TerminationTerm, TerminationTermCfg,
};
pub use noise::{NoiseCfg, NoiseModelCfg, NoiseOperation, ObservationNoise};
pub use ordered::{OrderedMap, TermCfgs};
pub use scene::{ArticulationData, Entity, ResolvedEntity, SceneEntityCfg, Simulation};

#[cfg(test)]
pub mod tests;
