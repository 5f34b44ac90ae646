//! Live environment state handed to every term.

use ndarray::Array1;

use crate::error::EvalError;
use crate::extras::Extras;
use crate::managers::ActionManager;
use crate::rng::{seeded, SimRng};
use crate::scene::{Entity, Simulation};

/// Everything a term may read or mutate while it runs.
///
/// Observation, reward and termination terms receive `&EnvContext`; event and
/// action terms receive mutable access. The random stream is shared by every
/// consumer and drawn from in a fixed order.
pub struct EnvContext<S: Simulation> {
    pub sim: S,
    pub actions: ActionManager<S>,
    pub extras: Extras,
    pub rng: SimRng,
    /// Steps since each environment's last reset.
    pub episode_length_buf: Array1<u32>,
    /// Steps since construction, across all resets.
    pub common_step_counter: u64,
    step_dt: f32,
    episode_length_s: f32,
    max_episode_length: u32,
}

impl<S: Simulation> EnvContext<S> {
    pub fn new(sim: S, decimation: u32, episode_length_s: f32, seed: u64) -> Self {
        let num_envs = sim.num_envs();
        let step_dt = sim.physics_dt() * decimation as f32;
        let max_episode_length = (episode_length_s / step_dt).ceil().min(u32::MAX as f32) as u32;
        Self {
            actions: ActionManager::empty(num_envs),
            extras: Extras::new(num_envs),
            rng: seeded(seed),
            episode_length_buf: Array1::zeros(num_envs),
            common_step_counter: 0,
            step_dt,
            episode_length_s,
            max_episode_length,
            sim,
        }
    }

    #[inline]
    pub fn num_envs(&self) -> usize {
        self.episode_length_buf.len()
    }

    /// Seconds per environment step (physics dt times decimation).
    #[inline]
    pub fn step_dt(&self) -> f32 {
        self.step_dt
    }

    #[inline]
    pub fn episode_length_s(&self) -> f32 {
        self.episode_length_s
    }

    /// Episode limit in steps.
    #[inline]
    pub fn max_episode_length(&self) -> u32 {
        self.max_episode_length
    }

    pub fn entity(&self, name: &str) -> Result<&Entity, EvalError> {
        self.sim
            .entity(name)
            .ok_or_else(|| EvalError::UnknownEntity(name.to_string()))
    }

    pub fn entity_mut(&mut self, name: &str) -> Result<&mut Entity, EvalError> {
        self.sim
            .entity_mut(name)
            .ok_or_else(|| EvalError::UnknownEntity(name.to_string()))
    }
}
