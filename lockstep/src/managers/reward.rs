//! Weighted reward aggregation with per-episode term sums.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::term::{ManagerTermCfg, ResolveTerm, TermRegistry};
use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EnvError, EvalError, ManagerKind};
use crate::ordered::{OrderedMap, TermCfgs};
use crate::scene::Simulation;

pub trait RewardTerm<S: Simulation> {
    /// Unweighted `(N,)` value.
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError>;

    fn reset(&mut self, _env_ids: &EnvIds) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTermCfg<F> {
    pub func: F,
    pub weight: f32,
}

impl<F> RewardTermCfg<F> {
    pub fn new(func: F, weight: f32) -> Self {
        Self { func, weight }
    }
}

impl<S, F> ManagerTermCfg<S> for RewardTermCfg<F>
where
    S: Simulation,
    F: ResolveTerm<S, Term = dyn RewardTerm<S>>,
{
    type Term = dyn RewardTerm<S>;

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.weight.is_finite() {
            return Err(ConfigError::invalid("weight", format!("{} is not finite", self.weight)));
        }
        Ok(())
    }

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError> {
        self.func.resolve(env)
    }
}

/// One term's contribution in the latest step.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardTermValues {
    pub raw: Array1<f32>,
    pub weighted: Array1<f32>,
}

pub struct RewardManager<S: Simulation> {
    terms: TermRegistry<dyn RewardTerm<S>>,
    weights: Vec<f32>,
    reward_buf: Array1<f32>,
    /// `(N, T)` unweighted values of the latest step.
    raw: Array2<f32>,
    /// `(N, T)` weighted values of the latest step.
    weighted: Array2<f32>,
    /// `(N, T)` weighted sums since each environment's last reset.
    episode_sums: Array2<f32>,
    episode_length_s: f32,
}

impl<S: Simulation> RewardManager<S> {
    pub fn new<F>(cfgs: &TermCfgs<RewardTermCfg<F>>, env: &mut EnvContext<S>) -> Result<Self, ConfigError>
    where
        F: ResolveTerm<S, Term = dyn RewardTerm<S>>,
    {
        let num_envs = env.num_envs();
        let (terms, enabled) = TermRegistry::build(ManagerKind::Reward, cfgs, env)?;
        let weights: Vec<f32> = enabled.iter().map(|c| c.weight).collect();
        for (name, &w) in terms.names().iter().zip(weights.iter()) {
            if w == 0.0 {
                log::warn!("reward term '{name}' has zero weight; it is evaluated for logging only");
            }
        }
        let n_terms = terms.len();
        Ok(Self {
            terms,
            weights,
            reward_buf: Array1::zeros(num_envs),
            raw: Array2::zeros((num_envs, n_terms)),
            weighted: Array2::zeros((num_envs, n_terms)),
            episode_sums: Array2::zeros((num_envs, n_terms)),
            episode_length_s: env.episode_length_s(),
        })
    }

    pub fn active_terms(&self) -> &[String] {
        self.terms.names()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Evaluate every term and return `Σ weight × value` per environment.
    pub fn compute(&mut self, env: &EnvContext<S>) -> Result<&Array1<f32>, EnvError> {
        let num_envs = env.num_envs();
        let values = self.terms.evaluate_all(|_, term| {
            let value = term.compute(env)?;
            if value.len() != num_envs {
                return Err(EvalError::ShapeMismatch {
                    expected: vec![num_envs],
                    actual: value.shape().to_vec(),
                });
            }
            Ok(value)
        })?;

        self.reward_buf.fill(0.0);
        for (t, (value, &weight)) in values.values().zip(self.weights.iter()).enumerate() {
            let weighted = value * weight;
            self.raw.column_mut(t).assign(value);
            self.weighted.column_mut(t).assign(&weighted);
            self.reward_buf += &weighted;
            let mut sum = self.episode_sums.column_mut(t);
            sum += &weighted;
        }
        Ok(&self.reward_buf)
    }

    pub fn reward(&self) -> &Array1<f32> {
        &self.reward_buf
    }

    /// Per-term values of the latest step.
    pub fn step_breakdown(&self) -> OrderedMap<RewardTermValues> {
        self.terms
            .names()
            .iter()
            .enumerate()
            .map(|(t, name)| {
                (
                    name.clone(),
                    RewardTermValues {
                        raw: self.raw.column(t).to_owned(),
                        weighted: self.weighted.column(t).to_owned(),
                    },
                )
            })
            .collect()
    }

    pub fn episode_sums(&self, term: &str) -> Option<Array1<f32>> {
        let t = self.terms.position(term)?;
        Some(self.episode_sums.column(t).to_owned())
    }

    /// Report `Episode_Reward/<term>` for the reset subset and clear its sums.
    pub fn reset(&mut self, env_ids: &EnvIds) -> OrderedMap<f32> {
        let mut log = OrderedMap::new();
        let count = env_ids.count();
        for (t, name) in self.terms.names().iter().enumerate() {
            let total: f32 = env_ids.iter().map(|i| self.episode_sums[[i, t]]).sum();
            let mean = if count > 0 { total / count as f32 } else { 0.0 };
            log.insert(format!("Episode_Reward/{name}"), mean / self.episode_length_s);
        }
        for i in env_ids.iter() {
            self.episode_sums.row_mut(i).fill(0.0);
        }
        for (_, term) in self.terms.iter_mut() {
            term.reset(env_ids);
        }
        log
    }
}
