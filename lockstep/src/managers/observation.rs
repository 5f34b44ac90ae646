//! Observation groups and the per-term shaping pipeline.
//!
//! Every step each term's raw `(N, F)` output passes through, in order:
//! noise (only when the group enables corruption), clip, scale, delay and
//! history. A group then either concatenates its shaped terms along one axis
//! or returns them by name.

use ndarray::{concatenate, Array1, Array2, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use super::term::{ManagerTermCfg, ResolveTerm, TermRegistry};
use crate::buffers::{CircularBuffer, DelayBuffer, DelayCfg};
use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EnvError, EvalError, ManagerKind};
use crate::noise::{NoiseModel, ObservationNoise};
use crate::ordered::{OrderedMap, TermCfgs};
use crate::rng::SimRng;
use crate::scene::Simulation;

// ============================================================================
// Term trait
// ============================================================================

pub trait ObservationTerm<S: Simulation> {
    /// Raw `(N, F)` value for the current state.
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array2<f32>, EvalError>;

    fn reset(&mut self, _env_ids: &EnvIds) {}
}

// ============================================================================
// Configuration
// ============================================================================

/// Scalar or per-feature multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObsScale {
    Scalar(f32),
    PerFeature(Vec<f32>),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationTermCfg<F> {
    pub func: F,
    #[serde(default)]
    pub noise: Option<ObservationNoise>,
    #[serde(default)]
    pub clip: Option<(f32, f32)>,
    #[serde(default)]
    pub scale: Option<ObsScale>,
    #[serde(default)]
    pub delay_min_lag: usize,
    #[serde(default)]
    pub delay_max_lag: usize,
    #[serde(default = "default_true")]
    pub delay_per_env: bool,
    #[serde(default)]
    pub delay_hold_prob: f32,
    #[serde(default)]
    pub delay_update_period: usize,
    #[serde(default = "default_true")]
    pub delay_per_env_phase: bool,
    #[serde(default)]
    pub history_length: usize,
    #[serde(default = "default_true")]
    pub flatten_history_dim: bool,
}

impl<F> ObservationTermCfg<F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            noise: None,
            clip: None,
            scale: None,
            delay_min_lag: 0,
            delay_max_lag: 0,
            delay_per_env: true,
            delay_hold_prob: 0.0,
            delay_update_period: 0,
            delay_per_env_phase: true,
            history_length: 0,
            flatten_history_dim: true,
        }
    }

    pub fn with_noise(mut self, noise: impl Into<ObservationNoise>) -> Self {
        self.noise = Some(noise.into());
        self
    }

    pub fn with_clip(mut self, min: f32, max: f32) -> Self {
        self.clip = Some((min, max));
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(ObsScale::Scalar(scale));
        self
    }

    pub fn with_feature_scale(mut self, scale: Vec<f32>) -> Self {
        self.scale = Some(ObsScale::PerFeature(scale));
        self
    }

    /// Uniform lag in `[min_lag, max_lag]` steps, redrawn every step.
    pub fn with_delay(mut self, min_lag: usize, max_lag: usize) -> Self {
        self.delay_min_lag = min_lag;
        self.delay_max_lag = max_lag;
        self
    }

    pub fn with_shared_delay(mut self) -> Self {
        self.delay_per_env = false;
        self
    }

    pub fn with_delay_hold_prob(mut self, hold_prob: f32) -> Self {
        self.delay_hold_prob = hold_prob;
        self
    }

    pub fn with_delay_update_period(mut self, period: usize, per_env_phase: bool) -> Self {
        self.delay_update_period = period;
        self.delay_per_env_phase = per_env_phase;
        self
    }

    pub fn with_history(mut self, length: usize, flatten: bool) -> Self {
        self.history_length = length;
        self.flatten_history_dim = flatten;
        self
    }

    pub fn delay_cfg(&self) -> DelayCfg {
        DelayCfg {
            min_lag: self.delay_min_lag,
            max_lag: self.delay_max_lag,
            per_env: self.delay_per_env,
            hold_prob: self.delay_hold_prob,
            update_period: self.delay_update_period,
            per_env_phase: self.delay_per_env_phase,
        }
    }
}

impl<S, F> ManagerTermCfg<S> for ObservationTermCfg<F>
where
    S: Simulation,
    F: ResolveTerm<S, Term = dyn ObservationTerm<S>>,
{
    type Term = dyn ObservationTerm<S>;

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(noise) = &self.noise {
            noise.validate()?;
        }
        if let Some((min, max)) = self.clip {
            if min > max || min.is_nan() || max.is_nan() {
                return Err(ConfigError::invalid(
                    "clip",
                    format!("({min}, {max}) is not a valid interval"),
                ));
            }
        }
        self.delay_cfg().validate()
    }

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError> {
        self.func.resolve(env)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationGroupCfg<F> {
    pub terms: TermCfgs<ObservationTermCfg<F>>,
    #[serde(default = "default_true")]
    pub concatenate_terms: bool,
    /// Axis over the full term tensor (batch axis included). Negative counts
    /// from the end.
    #[serde(default = "default_concat_dim")]
    pub concatenate_dim: isize,
    #[serde(default)]
    pub enable_corruption: bool,
    /// Overrides every term's history length (and flatten flag) when set.
    #[serde(default)]
    pub history_length: Option<usize>,
    #[serde(default = "default_true")]
    pub flatten_history_dim: bool,
}

fn default_concat_dim() -> isize {
    -1
}

impl<F> ObservationGroupCfg<F> {
    pub fn new(terms: TermCfgs<ObservationTermCfg<F>>) -> Self {
        Self {
            terms,
            concatenate_terms: true,
            concatenate_dim: -1,
            enable_corruption: false,
            history_length: None,
            flatten_history_dim: true,
        }
    }

    pub fn with_corruption(mut self, enabled: bool) -> Self {
        self.enable_corruption = enabled;
        self
    }

    pub fn with_concatenation(mut self, concatenate: bool, dim: isize) -> Self {
        self.concatenate_terms = concatenate;
        self.concatenate_dim = dim;
        self
    }

    pub fn with_history(mut self, length: usize, flatten: bool) -> Self {
        self.history_length = Some(length);
        self.flatten_history_dim = flatten;
        self
    }
}

/// Observation groups by name.
pub type ObservationCfg<F> = TermCfgs<ObservationGroupCfg<F>>;

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum GroupObs {
    Concatenated(ArrayD<f32>),
    Terms(OrderedMap<ArrayD<f32>>),
}

impl GroupObs {
    pub fn as_tensor(&self) -> Option<&ArrayD<f32>> {
        match self {
            GroupObs::Concatenated(t) => Some(t),
            GroupObs::Terms(_) => None,
        }
    }

    pub fn term(&self, name: &str) -> Option<&ArrayD<f32>> {
        match self {
            GroupObs::Concatenated(_) => None,
            GroupObs::Terms(terms) => terms.get(name),
        }
    }
}

pub type Observations = OrderedMap<GroupObs>;

// ============================================================================
// Runtime
// ============================================================================

/// Shaping state of one term.
struct TermPipeline {
    feature_dim: usize,
    noise: Option<NoiseModel>,
    clip: Option<(f32, f32)>,
    scale: Option<Array1<f32>>,
    delay: Option<DelayBuffer>,
    history: Option<CircularBuffer>,
    flatten_history: bool,
    /// Shaped output shape, batch axis included.
    shape: Vec<usize>,
}

impl TermPipeline {
    fn new<F>(
        cfg: &ObservationTermCfg<F>,
        group: &ObservationGroupCfg<F>,
        num_envs: usize,
        feature_dim: usize,
        rng: &mut SimRng,
    ) -> Result<Self, ConfigError> {
        let scale = match &cfg.scale {
            None => None,
            Some(ObsScale::Scalar(s)) => Some(Array1::from_elem(feature_dim, *s)),
            Some(ObsScale::PerFeature(v)) if v.len() == feature_dim => {
                Some(Array1::from_vec(v.clone()))
            }
            Some(ObsScale::PerFeature(v)) => {
                return Err(ConfigError::ShapeMismatch {
                    what: "scale".into(),
                    message: format!("{} entries for {feature_dim} features", v.len()),
                })
            }
        };

        let delay_cfg = cfg.delay_cfg();
        let delay = if delay_cfg.is_active() {
            Some(DelayBuffer::new(delay_cfg, num_envs, feature_dim, rng)?)
        } else {
            None
        };

        let (history_length, flatten_history) = match group.history_length {
            Some(h) => (h, group.flatten_history_dim),
            None => (cfg.history_length, cfg.flatten_history_dim),
        };
        let history = if history_length > 0 {
            Some(CircularBuffer::new(history_length, num_envs, feature_dim)?)
        } else {
            None
        };

        let shape = match (history_length, flatten_history) {
            (0, _) => vec![num_envs, feature_dim],
            (h, true) => vec![num_envs, h * feature_dim],
            (h, false) => vec![num_envs, h, feature_dim],
        };

        Ok(Self {
            feature_dim,
            noise: cfg
                .noise
                .as_ref()
                .map(|n| NoiseModel::new(n, num_envs, feature_dim)),
            clip: cfg.clip,
            scale,
            delay,
            history,
            flatten_history,
            shape,
        })
    }

    fn process(
        &mut self,
        raw: Array2<f32>,
        corrupt: bool,
        rng: &mut SimRng,
    ) -> Result<ArrayD<f32>, EvalError> {
        let mut obs = raw;
        if corrupt {
            if let Some(noise) = &self.noise {
                noise.apply(&mut obs, rng);
            }
        }
        if let Some((min, max)) = self.clip {
            obs.mapv_inplace(|v| v.clamp(min, max));
        }
        if let Some(scale) = &self.scale {
            obs *= scale;
        }
        if let Some(delay) = &mut self.delay {
            obs = delay.compute(obs.view(), rng);
        }
        let Some(history) = &mut self.history else {
            return Ok(obs.into_dyn());
        };
        history.append(obs.view());
        let stacked = history.buffer();
        if self.flatten_history {
            let (n, h, f) = stacked.dim();
            let flat: Vec<f32> = stacked.iter().copied().collect();
            ArrayD::from_shape_vec(IxDyn(&[n, h * f]), flat)
                .map_err(|e| EvalError::Failed(e.to_string()))
        } else {
            Ok(stacked.into_dyn())
        }
    }

    fn reset(&mut self, env_ids: &EnvIds, rng: &mut SimRng) {
        if let Some(noise) = &mut self.noise {
            noise.reset(env_ids, rng);
        }
        if let Some(delay) = &mut self.delay {
            delay.reset(env_ids);
        }
        if let Some(history) = &mut self.history {
            history.reset(env_ids);
        }
    }
}

struct ObservationGroup<S: Simulation> {
    name: String,
    terms: TermRegistry<dyn ObservationTerm<S>>,
    pipelines: Vec<TermPipeline>,
    concatenate: bool,
    concat_axis: usize,
    enable_corruption: bool,
    /// Concatenated shape, batch axis included.
    shape: Option<Vec<usize>>,
}

impl<S: Simulation> ObservationGroup<S> {
    fn compute(&mut self, env: &mut EnvContext<S>) -> Result<GroupObs, EnvError> {
        let num_envs = env.num_envs();
        let corrupt = self.enable_corruption;
        let pipelines = &mut self.pipelines;
        let shaped = self.terms.evaluate_all(|i, term| {
            let raw = term.compute(env)?;
            let pipeline = &mut pipelines[i];
            if raw.dim() != (num_envs, pipeline.feature_dim) {
                return Err(EvalError::ShapeMismatch {
                    expected: vec![num_envs, pipeline.feature_dim],
                    actual: raw.shape().to_vec(),
                });
            }
            pipeline.process(raw, corrupt, &mut env.rng)
        })?;

        if !self.concatenate {
            return Ok(GroupObs::Terms(shaped));
        }
        let views: Vec<_> = shaped.values().map(|a| a.view()).collect();
        let tensor = concatenate(Axis(self.concat_axis), &views).map_err(|e| EnvError::Term {
            manager: ManagerKind::Observation,
            term: self.name.clone(),
            source: EvalError::Failed(e.to_string()),
        })?;
        Ok(GroupObs::Concatenated(tensor))
    }
}

/// Resolve `dim` over tensors of rank `ndim`; the batch axis is not allowed.
fn resolve_concat_axis(dim: isize, ndim: usize) -> Option<usize> {
    let axis = if dim < 0 { ndim as isize + dim } else { dim };
    (axis >= 1 && (axis as usize) < ndim).then_some(axis as usize)
}

fn concatenated_shape(shapes: &[Vec<usize>], axis: usize) -> Result<Vec<usize>, String> {
    let first = shapes.first().ok_or("group has no active terms")?;
    let mut out = first.clone();
    for shape in &shapes[1..] {
        if shape.len() != first.len() {
            return Err(format!("term ranks differ: {first:?} vs {shape:?}"));
        }
        for (d, (&a, &b)) in first.iter().zip(shape.iter()).enumerate() {
            if d != axis && a != b {
                return Err(format!("dimension {d} differs: {first:?} vs {shape:?}"));
            }
        }
        out[axis] += shape[axis];
    }
    Ok(out)
}

/// Computes observation groups and owns their shaping state.
pub struct ObservationManager<S: Simulation> {
    groups: Vec<ObservationGroup<S>>,
}

impl<S: Simulation> ObservationManager<S> {
    pub fn new<F>(cfg: &ObservationCfg<F>, env: &mut EnvContext<S>) -> Result<Self, ConfigError>
    where
        F: ResolveTerm<S, Term = dyn ObservationTerm<S>>,
    {
        let num_envs = env.num_envs();
        let mut groups = Vec::new();
        for (group_name, group_cfg) in cfg.iter() {
            let Some(group_cfg) = group_cfg else {
                log::warn!("observation group '{group_name}' is disabled");
                continue;
            };
            let (mut terms, term_cfgs) =
                TermRegistry::build(ManagerKind::Observation, &group_cfg.terms, env)?;

            let mut pipelines = Vec::with_capacity(terms.len());
            for (i, term_cfg) in term_cfgs.iter().enumerate() {
                let term_name = terms.names()[i].clone();
                let sample = terms.term_mut(i).compute(env).map_err(|source| {
                    ConfigError::FirstEvaluation {
                        manager: ManagerKind::Observation,
                        term: term_name.clone(),
                        source,
                    }
                })?;
                if sample.nrows() != num_envs {
                    return Err(ConfigError::ShapeMismatch {
                        what: term_name,
                        message: format!("{} rows for {num_envs} environments", sample.nrows()),
                    });
                }
                let pipeline =
                    TermPipeline::new(term_cfg, group_cfg, num_envs, sample.ncols(), &mut env.rng)
                        .map_err(|e| e.in_term(ManagerKind::Observation, &term_name))?;
                pipelines.push(pipeline);
            }

            let term_shapes: Vec<Vec<usize>> = pipelines.iter().map(|p| p.shape.clone()).collect();
            let (concat_axis, shape) = if group_cfg.concatenate_terms && !pipelines.is_empty() {
                let ndim = term_shapes[0].len();
                let axis = resolve_concat_axis(group_cfg.concatenate_dim, ndim).ok_or_else(|| {
                    ConfigError::invalid(
                        "concatenate_dim",
                        format!(
                            "{} is not a feature axis of rank-{ndim} terms in group '{group_name}'",
                            group_cfg.concatenate_dim
                        ),
                    )
                })?;
                let shape = concatenated_shape(&term_shapes, axis).map_err(|message| {
                    ConfigError::ShapeMismatch {
                        what: format!("observation group '{group_name}'"),
                        message,
                    }
                })?;
                (axis, Some(shape))
            } else {
                (1, None)
            };

            for (name, shape) in terms.names().iter().zip(term_shapes.iter()) {
                log::info!("observation group '{group_name}' term '{name}': shape {shape:?}");
            }

            groups.push(ObservationGroup {
                name: group_name.to_string(),
                terms,
                pipelines,
                concatenate: group_cfg.concatenate_terms,
                concat_axis,
                enable_corruption: group_cfg.enable_corruption,
                shape,
            });
        }
        Ok(Self { groups })
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    fn group(&self, name: &str) -> Option<&ObservationGroup<S>> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn active_terms(&self, group: &str) -> Option<&[String]> {
        self.group(group).map(|g| g.terms.names())
    }

    /// Shape of a concatenated group, batch axis included.
    pub fn group_obs_dim(&self, group: &str) -> Option<&[usize]> {
        self.group(group).and_then(|g| g.shape.as_deref())
    }

    /// Shaped output shape of every term in a group.
    pub fn group_obs_term_dim(&self, group: &str) -> Option<Vec<(&str, &[usize])>> {
        self.group(group).map(|g| {
            g.terms
                .names()
                .iter()
                .map(String::as_str)
                .zip(g.pipelines.iter().map(|p| p.shape.as_slice()))
                .collect()
        })
    }

    pub fn compute(&mut self, env: &mut EnvContext<S>) -> Result<Observations, EnvError> {
        let mut out = OrderedMap::new();
        for group in &mut self.groups {
            let obs = group.compute(env)?;
            out.insert(group.name.clone(), obs);
        }
        Ok(out)
    }

    pub fn compute_group(&mut self, name: &str, env: &mut EnvContext<S>) -> Result<GroupObs, EnvError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| EnvError::UnknownGroup(name.to_string()))?;
        group.compute(env)
    }

    /// Reset shaping state and term state for `env_ids`.
    pub fn reset(&mut self, env_ids: &EnvIds, rng: &mut SimRng) {
        for group in &mut self.groups {
            for pipeline in &mut group.pipelines {
                pipeline.reset(env_ids, rng);
            }
            for (_, term) in group.terms.iter_mut() {
                term.reset(env_ids);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_axis_excludes_batch() {
        assert_eq!(resolve_concat_axis(-1, 2), Some(1));
        assert_eq!(resolve_concat_axis(-1, 3), Some(2));
        assert_eq!(resolve_concat_axis(1, 3), Some(1));
        assert_eq!(resolve_concat_axis(0, 2), None);
        assert_eq!(resolve_concat_axis(-2, 2), None);
        assert_eq!(resolve_concat_axis(3, 3), None);
    }

    #[test]
    fn concatenated_shape_sums_axis() {
        let shapes = vec![vec![4, 3], vec![4, 5]];
        assert_eq!(concatenated_shape(&shapes, 1).unwrap(), vec![4, 8]);
        let mixed = vec![vec![4, 2, 3], vec![4, 6]];
        assert!(concatenated_shape(&mixed, 1).is_err());
    }
}
