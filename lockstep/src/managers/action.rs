//! Policy action routing.
//!
//! The flat `(N, D)` action is split into consecutive column blocks, one per
//! action term in declaration order. Terms process their block once per
//! environment step and write targets into the simulation once per physics
//! substep.

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::term::{ManagerTermCfg, ResolveTerm, TermRegistry};
use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EnvError, EvalError, ManagerKind};
use crate::ordered::TermCfgs;
use crate::scene::Simulation;

pub trait ActionTerm<S: Simulation> {
    fn action_dim(&self) -> usize;

    /// Take this step's `(N, action_dim)` block.
    fn process_actions(&mut self, actions: ArrayView2<f32>);

    /// Write processed actions into the simulation.
    fn apply_actions(&mut self, sim: &mut S) -> Result<(), EvalError>;

    fn raw_actions(&self) -> ArrayView2<'_, f32>;

    fn processed_actions(&self) -> ArrayView2<'_, f32>;

    fn reset(&mut self, _env_ids: &EnvIds) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTermCfg<F> {
    pub func: F,
}

impl<F> ActionTermCfg<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<S, F> ManagerTermCfg<S> for ActionTermCfg<F>
where
    S: Simulation,
    F: ResolveTerm<S, Term = dyn ActionTerm<S>>,
{
    type Term = dyn ActionTerm<S>;

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError> {
        self.func.resolve(env)
    }
}

pub struct ActionManager<S: Simulation> {
    terms: TermRegistry<dyn ActionTerm<S>>,
    dims: Vec<usize>,
    action: Array2<f32>,
    prev_action: Array2<f32>,
}

impl<S: Simulation> ActionManager<S> {
    /// Manager with no terms, used until the real one is built.
    pub fn empty(num_envs: usize) -> Self {
        Self {
            terms: TermRegistry::empty(ManagerKind::Action),
            dims: Vec::new(),
            action: Array2::zeros((num_envs, 0)),
            prev_action: Array2::zeros((num_envs, 0)),
        }
    }

    pub fn new<F>(cfgs: &TermCfgs<ActionTermCfg<F>>, env: &mut EnvContext<S>) -> Result<Self, ConfigError>
    where
        F: ResolveTerm<S, Term = dyn ActionTerm<S>>,
    {
        let num_envs = env.num_envs();
        let (mut terms, _) = TermRegistry::build(ManagerKind::Action, cfgs, env)?;
        let dims: Vec<usize> = terms.iter_mut().map(|(_, t)| t.action_dim()).collect();
        let total: usize = dims.iter().sum();
        Ok(Self {
            terms,
            dims,
            action: Array2::zeros((num_envs, total)),
            prev_action: Array2::zeros((num_envs, total)),
        })
    }

    pub fn active_terms(&self) -> &[String] {
        self.terms.names()
    }

    pub fn total_action_dim(&self) -> usize {
        self.dims.iter().sum()
    }

    pub fn action_term_dim(&self) -> &[usize] {
        &self.dims
    }

    pub fn action(&self) -> &Array2<f32> {
        &self.action
    }

    pub fn prev_action(&self) -> &Array2<f32> {
        &self.prev_action
    }

    /// Raw action block of one term.
    pub fn term_action(&self, term: &str) -> Option<ArrayView2<'_, f32>> {
        let idx = self.terms.position(term)?;
        let start: usize = self.dims[..idx].iter().sum();
        Some(self.action.slice(s![.., start..start + self.dims[idx]]))
    }

    pub fn process_action(&mut self, actions: ArrayView2<f32>) -> Result<(), EnvError> {
        let (rows, cols) = actions.dim();
        if rows != self.action.nrows() {
            return Err(EnvError::BatchSize {
                expected: self.action.nrows(),
                actual: rows,
            });
        }
        if cols != self.total_action_dim() {
            return Err(EnvError::ActionShape {
                expected: self.total_action_dim(),
                actual: cols,
            });
        }
        self.prev_action.assign(&self.action);
        self.action.assign(&actions);

        let mut start = 0;
        for ((_, term), &dim) in self.terms.iter_mut().zip(self.dims.iter()) {
            term.process_actions(actions.slice(s![.., start..start + dim]));
            start += dim;
        }
        Ok(())
    }

    /// Push processed actions into the simulation. Called once per substep.
    pub fn apply_action(&mut self, sim: &mut S) -> Result<(), EnvError> {
        self.terms.evaluate_all(|_, term| term.apply_actions(sim))?;
        Ok(())
    }

    /// Zero current and previous actions of `env_ids`.
    pub fn reset(&mut self, env_ids: &EnvIds) {
        for i in env_ids.iter() {
            self.action.row_mut(i).fill(0.0);
            self.prev_action.row_mut(i).fill(0.0);
        }
        for (_, term) in self.terms.iter_mut() {
            term.reset(env_ids);
        }
    }
}
