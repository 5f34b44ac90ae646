//! Learner-facing balancing environment.

use ndarray::{Array1, ArrayView2};

use lockstep::error::Result;
use lockstep::{EvalError, ManagerBasedRlEnv, Observations, StepOutput};

use crate::config::BalancingEnvCfg;
use crate::mdp::{LEFT, RIGHT, STANDING_LEG};
use crate::sim::BipedSim;

/// Batched single-leg balancing environment.
///
/// Environments that finish an episode are reset inside [`step`](Self::step);
/// their entries in the returned observations already belong to the next
/// episode.
pub struct BalancingEnv {
    /// Configuration used to build the environment
    config: BalancingEnvCfg,
    inner: ManagerBasedRlEnv<BipedSim>,
}

impl BalancingEnv {
    /// Build the simulation and every manager from configuration.
    pub fn from_config(config: &BalancingEnvCfg) -> Result<Self> {
        config.validate()?;
        let sim = BipedSim::new(config.num_envs, &config.sim)?;
        let inner = ManagerBasedRlEnv::new(&config.env, sim)?;
        log::info!(
            "balancing env: {} envs, {} actions, {} s episodes",
            config.num_envs,
            inner.action_manager().total_action_dim(),
            config.env.episode_length_s
        );
        Ok(Self {
            config: config.clone(),
            inner,
        })
    }

    pub fn config(&self) -> &BalancingEnvCfg {
        &self.config
    }

    pub fn num_envs(&self) -> usize {
        self.inner.num_envs()
    }

    /// Width of one action row.
    pub fn action_dim(&self) -> usize {
        self.inner.action_manager().total_action_dim()
    }

    /// Per-environment shape of an observation group, if it exists.
    pub fn observation_dim(&self, group: &str) -> Option<&[usize]> {
        self.inner.observation_manager().group_obs_dim(group)
    }

    /// Reset every environment.
    pub fn reset(&mut self) -> Result<Observations> {
        self.inner.reset()
    }

    /// Advance every environment by one policy step with `(N, action_dim)`
    /// actions.
    pub fn step(&mut self, actions: ArrayView2<f32>) -> Result<StepOutput> {
        self.inner.step(actions)
    }

    /// Current standing leg per environment, [`LEFT`] or [`RIGHT`].
    pub fn standing_legs(&self) -> Result<Array1<usize>, EvalError> {
        let choice = self.inner.context().extras.read(&STANDING_LEG)?;
        Ok(choice.mapv(|leg| if leg == RIGHT as i64 { RIGHT } else { LEFT }))
    }

    pub fn sim(&self) -> &BipedSim {
        self.inner.sim()
    }

    /// The underlying manager-based environment.
    pub fn inner(&self) -> &ManagerBasedRlEnv<BipedSim> {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut ManagerBasedRlEnv<BipedSim> {
        &mut self.inner
    }
}
