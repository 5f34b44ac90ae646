//! Termination aggregation, split into time-outs and true terminations.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::term::{ManagerTermCfg, ResolveTerm, TermRegistry};
use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EnvError, EvalError, ManagerKind};
use crate::ordered::{OrderedMap, TermCfgs};
use crate::scene::Simulation;

pub trait TerminationTerm<S: Simulation> {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<bool>, EvalError>;

    fn reset(&mut self, _env_ids: &EnvIds) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationTermCfg<F> {
    pub func: F,
    /// Counts as truncation (time limit) rather than a terminal state.
    #[serde(default)]
    pub time_out: bool,
}

impl<F> TerminationTermCfg<F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            time_out: false,
        }
    }

    pub fn time_out(func: F) -> Self {
        Self {
            func,
            time_out: true,
        }
    }
}

impl<S, F> ManagerTermCfg<S> for TerminationTermCfg<F>
where
    S: Simulation,
    F: ResolveTerm<S, Term = dyn TerminationTerm<S>>,
{
    type Term = dyn TerminationTerm<S>;

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError> {
        self.func.resolve(env)
    }
}

pub struct TerminationManager<S: Simulation> {
    terms: TermRegistry<dyn TerminationTerm<S>>,
    time_out_flags: Vec<bool>,
    /// `(N, T)` flags of the latest step.
    term_dones: Array2<bool>,
    terminated: Array1<bool>,
    time_outs: Array1<bool>,
    dones: Array1<bool>,
}

impl<S: Simulation> TerminationManager<S> {
    pub fn new<F>(
        cfgs: &TermCfgs<TerminationTermCfg<F>>,
        env: &mut EnvContext<S>,
    ) -> Result<Self, ConfigError>
    where
        F: ResolveTerm<S, Term = dyn TerminationTerm<S>>,
    {
        let num_envs = env.num_envs();
        let (terms, enabled) = TermRegistry::build(ManagerKind::Termination, cfgs, env)?;
        let time_out_flags = enabled.iter().map(|c| c.time_out).collect();
        let n_terms = terms.len();
        Ok(Self {
            terms,
            time_out_flags,
            term_dones: Array2::from_elem((num_envs, n_terms), false),
            terminated: Array1::from_elem(num_envs, false),
            time_outs: Array1::from_elem(num_envs, false),
            dones: Array1::from_elem(num_envs, false),
        })
    }

    pub fn active_terms(&self) -> &[String] {
        self.terms.names()
    }

    /// Evaluate every term; returns `time_outs OR terminated`.
    pub fn compute(&mut self, env: &EnvContext<S>) -> Result<&Array1<bool>, EnvError> {
        let num_envs = env.num_envs();
        let values = self.terms.evaluate_all(|_, term| {
            let flags = term.compute(env)?;
            if flags.len() != num_envs {
                return Err(EvalError::ShapeMismatch {
                    expected: vec![num_envs],
                    actual: flags.shape().to_vec(),
                });
            }
            Ok(flags)
        })?;

        self.terminated.fill(false);
        self.time_outs.fill(false);
        for (t, (flags, &is_time_out)) in values.values().zip(self.time_out_flags.iter()).enumerate() {
            let target = if is_time_out {
                &mut self.time_outs
            } else {
                &mut self.terminated
            };
            target.zip_mut_with(flags, |acc, &f| *acc |= f);
            self.term_dones.column_mut(t).assign(flags);
        }
        self.dones = &self.terminated | &self.time_outs;
        Ok(&self.dones)
    }

    pub fn terminated(&self) -> &Array1<bool> {
        &self.terminated
    }

    pub fn time_outs(&self) -> &Array1<bool> {
        &self.time_outs
    }

    pub fn dones(&self) -> &Array1<bool> {
        &self.dones
    }

    /// Latest flags of one term.
    pub fn term_dones(&self, term: &str) -> Option<Array1<bool>> {
        let t = self.terms.position(term)?;
        Some(self.term_dones.column(t).to_owned())
    }

    /// Report `Episode_Termination/<term>` counts over the reset subset.
    pub fn reset(&mut self, env_ids: &EnvIds) -> OrderedMap<f32> {
        let mut log = OrderedMap::new();
        for (t, name) in self.terms.names().iter().enumerate() {
            let count = env_ids.iter().filter(|&i| self.term_dones[[i, t]]).count();
            log.insert(format!("Episode_Termination/{name}"), count as f32);
        }
        for (_, term) in self.terms.iter_mut() {
            term.reset(env_ids);
        }
        log
    }
}
