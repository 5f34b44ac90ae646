//! Term registry shared by all managers.
//!
//! A configuration names each term's function as a variant of a serde enum.
//! [`ResolveTerm`] turns that variant into a boxed term object once, at
//! manager construction, after validating its parameters against the scene.
//! [`TermRegistry`] keeps the resolved terms in declaration order and runs them
//! with failure context attached.

use crate::context::EnvContext;
use crate::error::{ConfigError, EnvError, EvalError, ManagerKind};
use crate::ordered::{OrderedMap, TermCfgs};
use crate::scene::Simulation;

/// A term function description that can be bound to live state.
pub trait ResolveTerm<S: Simulation> {
    /// The term object produced, e.g. `dyn RewardTerm<S>`.
    type Term: ?Sized;

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError>;
}

/// Per-manager term configuration wrapping a [`ResolveTerm`] function.
pub trait ManagerTermCfg<S: Simulation> {
    type Term: ?Sized;

    /// Check term-level parameters (weights, ranges) before resolution.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError>;
}

/// Resolved terms of one manager, in declaration order.
pub struct TermRegistry<T: ?Sized> {
    kind: ManagerKind,
    names: Vec<String>,
    terms: Vec<Box<T>>,
}

impl<T: ?Sized> TermRegistry<T> {
    pub fn empty(kind: ManagerKind) -> Self {
        Self {
            kind,
            names: Vec::new(),
            terms: Vec::new(),
        }
    }

    /// Resolve every enabled term. Returns the registry together with the
    /// configurations of the enabled terms, aligned by index.
    pub fn build<'c, S, C>(
        kind: ManagerKind,
        cfgs: &'c TermCfgs<C>,
        env: &mut EnvContext<S>,
    ) -> Result<(Self, Vec<&'c C>), ConfigError>
    where
        S: Simulation,
        C: ManagerTermCfg<S, Term = T>,
    {
        let mut registry = Self::empty(kind);
        let mut enabled = Vec::new();
        for (name, cfg) in cfgs.iter() {
            let Some(cfg) = cfg else {
                log::warn!("{kind} term '{name}' is disabled");
                continue;
            };
            cfg.validate().map_err(|e| e.in_term(kind, name))?;
            let term = cfg.resolve(env).map_err(|e| e.in_term(kind, name))?;
            registry.names.push(name.to_string());
            registry.terms.push(term);
            enabled.push(cfg);
        }
        log::info!(
            "{kind} manager active terms: [{}]",
            registry.names.join(", ")
        );
        Ok((registry, enabled))
    }

    pub fn kind(&self) -> ManagerKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn term_mut(&mut self, index: usize) -> &mut T {
        &mut self.terms[index]
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.terms.iter_mut().map(|t| &mut **t))
    }

    /// Evaluate every term in order, wrapping failures with the manager and
    /// term name.
    pub fn evaluate_all<R>(
        &mut self,
        mut eval: impl FnMut(usize, &mut T) -> Result<R, EvalError>,
    ) -> Result<OrderedMap<R>, EnvError> {
        let mut out = OrderedMap::new();
        for (i, (name, term)) in self.names.iter().zip(self.terms.iter_mut()).enumerate() {
            let value = eval(i, &mut **term).map_err(|source| EnvError::Term {
                manager: self.kind,
                term: name.clone(),
                source,
            })?;
            out.insert(name.clone(), value);
        }
        Ok(out)
    }

    /// Evaluate one term by index with failure context.
    pub fn evaluate<R>(
        &mut self,
        index: usize,
        eval: impl FnOnce(&mut T) -> Result<R, EvalError>,
    ) -> Result<R, EnvError> {
        eval(&mut *self.terms[index]).map_err(|source| EnvError::Term {
            manager: self.kind,
            term: self.names[index].clone(),
            source,
        })
    }
}
