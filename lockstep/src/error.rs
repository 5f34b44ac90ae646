//! Error types.
//!
//! Construction problems surface as [`ConfigError`] before the first step.
//! Term evaluation problems surface as [`EvalError`] and are wrapped into
//! [`EnvError::Term`] by the manager that ran the term, so the caller always
//! learns which manager and which term failed.

use std::fmt;

use thiserror::Error;

/// The five term managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    Observation,
    Action,
    Event,
    Reward,
    Termination,
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerKind::Observation => "observation",
            ManagerKind::Action => "action",
            ManagerKind::Event => "event",
            ManagerKind::Reward => "reward",
            ManagerKind::Termination => "termination",
        };
        f.write_str(name)
    }
}

/// Invalid configuration, detected while building managers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration for '{param}': {message}")]
    InvalidConfig { param: String, message: String },

    #[error("invalid name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("pattern '{pattern}' matched none of {available:?}")]
    UnmatchedPattern {
        pattern: String,
        available: Vec<String>,
    },

    #[error("name '{name}' is matched by more than one pattern: {patterns:?}")]
    AmbiguousMatch { name: String, patterns: Vec<String> },

    #[error("unknown scene entity '{0}'")]
    UnknownEntity(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("'{what}' has incompatible shapes: {message}")]
    ShapeMismatch { what: String, message: String },

    #[error("{manager} term '{term}': {source}")]
    Term {
        manager: ManagerKind,
        term: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("{manager} term '{term}' failed its first evaluation: {source}")]
    FirstEvaluation {
        manager: ManagerKind,
        term: String,
        #[source]
        source: EvalError,
    },
}

impl ConfigError {
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidConfig {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Attach the owning manager and term name.
    pub fn in_term(self, manager: ManagerKind, term: &str) -> Self {
        ConfigError::Term {
            manager,
            term: term.to_string(),
            source: Box::new(self),
        }
    }
}

/// Failure while evaluating a single term against live state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown scene entity '{0}'")]
    UnknownEntity(String),

    #[error("entity '{entity}' has no sensor '{sensor}'")]
    UnknownSensor { entity: String, sensor: String },

    #[error("scratch entry '{key}' holds {actual} values, expected {expected}")]
    ScratchType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("output shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{0}")]
    Failed(String),
}

/// Errors raised while stepping or resetting an environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("{manager} term '{term}' failed: {source}")]
    Term {
        manager: ManagerKind,
        term: String,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("action has {actual} columns, expected {expected}")]
    ActionShape { expected: usize, actual: usize },

    #[error("action batch has {actual} rows, expected {expected}")]
    BatchSize { expected: usize, actual: usize },

    #[error("simulation failed: {0}")]
    Simulation(#[source] EvalError),

    #[error("unknown observation group '{0}'")]
    UnknownGroup(String),
}

pub type Result<T, E = EnvError> = std::result::Result<T, E>;
