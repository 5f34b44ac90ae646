//! Manager-based batched RL environment.
//!
//! # Step order
//!
//! 1. Route the action to action terms.
//! 2. For each of `decimation` substeps: apply actions, step physics.
//! 3. Advance episode and global step counters.
//! 4. Evaluate terminations, then rewards.
//! 5. Reset every environment that is done (reset-mode events run here).
//! 6. Advance interval events.
//! 7. Compute observations, so freshly reset environments report their
//!    post-reset state.

use std::collections::BTreeMap;
use std::fmt::Debug;

use ndarray::{Array1, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EnvError, Result};
use crate::extras::ScratchValue;
use crate::managers::{
    ActionManager, ActionTerm, ActionTermCfg, EventManager, EventTerm, EventTermCfg, GroupObs,
    ObservationCfg, ObservationManager, ObservationTerm, Observations, ResolveTerm, RewardManager,
    RewardTerm, RewardTermCfg, RewardTermValues, TerminationManager, TerminationTerm,
    TerminationTermCfg,
};
use crate::ordered::{OrderedMap, TermCfgs};
use crate::scene::Simulation;

// ============================================================================
// Configuration
// ============================================================================

/// The closed set of term functions a task can name, one enum per manager.
pub trait TermSet {
    type Sim: Simulation;
    type Observation: ResolveTerm<Self::Sim, Term = dyn ObservationTerm<Self::Sim>>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned;
    type Action: ResolveTerm<Self::Sim, Term = dyn ActionTerm<Self::Sim>>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned;
    type Event: ResolveTerm<Self::Sim, Term = dyn EventTerm<Self::Sim>>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned;
    type Reward: ResolveTerm<Self::Sim, Term = dyn RewardTerm<Self::Sim>>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned;
    type Termination: ResolveTerm<Self::Sim, Term = dyn TerminationTerm<Self::Sim>>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned;
}

/// Full environment configuration. The batch size comes from the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EnvCfg<T: TermSet> {
    /// Physics substeps per environment step.
    pub decimation: u32,
    pub episode_length_s: f32,
    #[serde(default)]
    pub seed: u64,
    pub observations: ObservationCfg<T::Observation>,
    pub actions: TermCfgs<ActionTermCfg<T::Action>>,
    #[serde(default)]
    pub events: TermCfgs<EventTermCfg<T::Event>>,
    #[serde(default)]
    pub rewards: TermCfgs<RewardTermCfg<T::Reward>>,
    #[serde(default)]
    pub terminations: TermCfgs<TerminationTermCfg<T::Termination>>,
}

impl<T: TermSet> EnvCfg<T> {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.decimation == 0 {
            return Err(ConfigError::invalid("decimation", "must be at least 1"));
        }
        if !(self.episode_length_s > 0.0) {
            return Err(ConfigError::invalid(
                "episode_length_s",
                format!("{} is not positive", self.episode_length_s),
            ));
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ============================================================================
// Step output
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Episode statistics of environments reset during this step.
    pub log: OrderedMap<f32>,
    pub reward_terms: OrderedMap<RewardTermValues>,
    pub time_outs: Array1<bool>,
    /// Scratch entries after this step's resets.
    pub scratch: BTreeMap<String, ScratchValue>,
    pub reset_env_ids: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct StepOutput {
    pub observations: Observations,
    pub rewards: Array1<f32>,
    pub terminated: Array1<bool>,
    pub time_outs: Array1<bool>,
    pub dones: Array1<bool>,
    pub info: StepInfo,
}

// ============================================================================
// Environment
// ============================================================================

pub struct ManagerBasedRlEnv<S: Simulation> {
    ctx: EnvContext<S>,
    decimation: u32,
    observations: ObservationManager<S>,
    events: EventManager<S>,
    rewards: RewardManager<S>,
    terminations: TerminationManager<S>,
}

impl<S: Simulation> ManagerBasedRlEnv<S> {
    /// Build every manager, then fire startup events.
    pub fn new<T: TermSet<Sim = S>>(cfg: &EnvCfg<T>, sim: S) -> Result<Self> {
        cfg.validate()?;
        let mut ctx = EnvContext::new(sim, cfg.decimation, cfg.episode_length_s, cfg.seed);
        if ctx.num_envs() == 0 {
            return Err(ConfigError::invalid("num_envs", "simulation has no environments").into());
        }

        let actions = ActionManager::new(&cfg.actions, &mut ctx)?;
        ctx.actions = actions;
        let events = EventManager::new(&cfg.events, &mut ctx)?;
        let observations = ObservationManager::new(&cfg.observations, &mut ctx)?;
        let terminations = TerminationManager::new(&cfg.terminations, &mut ctx)?;
        let rewards = RewardManager::new(&cfg.rewards, &mut ctx)?;

        log::info!(
            "environment ready: {} envs, step_dt {:.4}s, max episode length {} steps",
            ctx.num_envs(),
            ctx.step_dt(),
            ctx.max_episode_length()
        );

        let mut env = Self {
            ctx,
            decimation: cfg.decimation,
            observations,
            events,
            rewards,
            terminations,
        };
        env.events.apply_startup(&mut env.ctx)?;
        Ok(env)
    }

    pub fn num_envs(&self) -> usize {
        self.ctx.num_envs()
    }

    pub fn step_dt(&self) -> f32 {
        self.ctx.step_dt()
    }

    pub fn max_episode_length(&self) -> u32 {
        self.ctx.max_episode_length()
    }

    pub fn common_step_counter(&self) -> u64 {
        self.ctx.common_step_counter
    }

    pub fn context(&self) -> &EnvContext<S> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EnvContext<S> {
        &mut self.ctx
    }

    pub fn sim(&self) -> &S {
        &self.ctx.sim
    }

    pub fn observation_manager(&self) -> &ObservationManager<S> {
        &self.observations
    }

    pub fn action_manager(&self) -> &ActionManager<S> {
        &self.ctx.actions
    }

    pub fn event_manager(&self) -> &EventManager<S> {
        &self.events
    }

    pub fn reward_manager(&self) -> &RewardManager<S> {
        &self.rewards
    }

    pub fn termination_manager(&self) -> &TerminationManager<S> {
        &self.terminations
    }

    /// Reset every environment and return fresh observations.
    pub fn reset(&mut self) -> Result<Observations> {
        let all = EnvIds::all(self.num_envs());
        self.reset_idx(&all)?;
        self.observations.compute(&mut self.ctx)
    }

    /// Compute one observation group outside the step loop.
    pub fn compute_group(&mut self, group: &str) -> Result<GroupObs> {
        self.observations.compute_group(group, &mut self.ctx)
    }

    pub fn step(&mut self, actions: ArrayView2<f32>) -> Result<StepOutput> {
        self.ctx.actions.process_action(actions)?;
        for _ in 0..self.decimation {
            let EnvContext { sim, actions, .. } = &mut self.ctx;
            actions.apply_action(sim)?;
            sim.step().map_err(EnvError::Simulation)?;
        }

        self.ctx.episode_length_buf.mapv_inplace(|n| n.saturating_add(1));
        self.ctx.common_step_counter += 1;

        let dones = self.terminations.compute(&self.ctx)?.clone();
        let terminated = self.terminations.terminated().clone();
        let time_outs = self.terminations.time_outs().clone();
        let rewards = self.rewards.compute(&self.ctx)?.clone();
        let reward_terms = self.rewards.step_breakdown();

        let reset_ids = EnvIds::from_done_flags(&terminated, &time_outs);
        let log = if reset_ids.any() {
            self.reset_idx(&reset_ids)?
        } else {
            OrderedMap::new()
        };

        let dt = self.ctx.step_dt();
        self.events.apply_interval(&mut self.ctx, dt)?;

        let observations = self.observations.compute(&mut self.ctx)?;
        Ok(StepOutput {
            observations,
            rewards,
            terminated,
            time_outs: time_outs.clone(),
            dones,
            info: StepInfo {
                log,
                reward_terms,
                time_outs,
                scratch: self.ctx.extras.snapshot(),
                reset_env_ids: reset_ids.to_vec(),
            },
        })
    }

    /// Reset the environments in `env_ids` and collect their episode logs.
    pub fn reset_idx(&mut self, env_ids: &EnvIds) -> Result<OrderedMap<f32>> {
        log::debug!(
            "resetting {} envs at step {}",
            env_ids.count(),
            self.ctx.common_step_counter
        );
        self.ctx.sim.reset(env_ids);
        self.ctx.extras.reset(env_ids);
        self.events.apply_reset(&mut self.ctx, env_ids)?;
        self.ctx.sim.forward().map_err(EnvError::Simulation)?;

        self.observations.reset(env_ids, &mut self.ctx.rng);
        self.events.reset(env_ids, &mut self.ctx);
        self.ctx.actions.reset(env_ids);
        let mut log = OrderedMap::new();
        log.extend(self.rewards.reset(env_ids));
        log.extend(self.terminations.reset(env_ids));

        for i in env_ids.iter() {
            self.ctx.episode_length_buf[i] = 0;
        }
        Ok(log)
    }
}
