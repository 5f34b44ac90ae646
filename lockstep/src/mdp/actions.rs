//! Joint position action term.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EvalError};
use crate::managers::ActionTerm;
use crate::ordered::OrderedMap;
use crate::scene::{SceneEntityCfg, Simulation};
use crate::string::resolve_matching_names_values;

/// Scalar scale, or a joint-pattern to scale map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionScale {
    Scalar(f32),
    PerJoint(OrderedMap<f32>),
}

impl Default for ActionScale {
    fn default() -> Self {
        ActionScale::Scalar(1.0)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointPositionActionCfg {
    pub entity_name: String,
    /// Joint name patterns driven by this term.
    pub actuator_names: Vec<String>,
    #[serde(default)]
    pub scale: ActionScale,
    /// Add the default joint position to the scaled action.
    #[serde(default = "default_true")]
    pub use_default_offset: bool,
    /// Per-joint-pattern `(min, max)` applied after scaling.
    #[serde(default)]
    pub clip: Option<OrderedMap<(f32, f32)>>,
}

impl JointPositionActionCfg {
    pub fn new<I, P>(entity_name: impl Into<String>, actuator_names: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            entity_name: entity_name.into(),
            actuator_names: actuator_names.into_iter().map(Into::into).collect(),
            scale: ActionScale::default(),
            use_default_offset: true,
            clip: None,
        }
    }

    pub fn with_scale(mut self, scale: ActionScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_clip(mut self, clip: OrderedMap<(f32, f32)>) -> Self {
        self.clip = Some(clip);
        self
    }
}

/// `target = raw × scale + offset`, optionally clamped per joint.
#[derive(Debug, Clone)]
pub struct JointPositionAction {
    entity: String,
    joint_ids: Vec<usize>,
    scale: Array1<f32>,
    offset: Array2<f32>,
    clip: Option<(Array1<f32>, Array1<f32>)>,
    raw: Array2<f32>,
    processed: Array2<f32>,
}

impl JointPositionAction {
    pub fn new<S: Simulation>(cfg: &JointPositionActionCfg, sim: &S) -> Result<Self, ConfigError> {
        let asset = SceneEntityCfg::new(cfg.entity_name.clone())
            .with_joints(cfg.actuator_names.iter().cloned())
            .resolve(sim)?;
        let entity = sim
            .entity(&asset.name)
            .ok_or_else(|| ConfigError::UnknownEntity(asset.name.clone()))?;
        let num_envs = sim.num_envs();
        let dim = asset.joint_ids.len();

        let scale = match &cfg.scale {
            ActionScale::Scalar(s) => Array1::from_elem(dim, *s),
            ActionScale::PerJoint(map) => per_joint(map, &asset.joint_names, dim, 1.0)?,
        };
        let offset = if cfg.use_default_offset {
            entity.data.default_joint_pos.select(Axis(1), &asset.joint_ids)
        } else {
            Array2::zeros((num_envs, dim))
        };
        let clip = match &cfg.clip {
            None => None,
            Some(map) => {
                let bounds = per_joint(map, &asset.joint_names, dim, (f32::NEG_INFINITY, f32::INFINITY))?;
                if let Some((lo, hi)) = bounds.iter().find(|(lo, hi)| lo > hi) {
                    return Err(ConfigError::invalid("clip", format!("({lo}, {hi}) is inverted")));
                }
                Some((bounds.mapv(|b| b.0), bounds.mapv(|b| b.1)))
            }
        };

        Ok(Self {
            entity: asset.name,
            joint_ids: asset.joint_ids,
            scale,
            offset,
            clip,
            raw: Array2::zeros((num_envs, dim)),
            processed: Array2::zeros((num_envs, dim)),
        })
    }
}

/// Resolve a pattern map to one value per selected joint; unmatched joints
/// keep `fallback`.
fn per_joint<V: Clone>(
    map: &OrderedMap<V>,
    joint_names: &[String],
    dim: usize,
    fallback: V,
) -> Result<Array1<V>, ConfigError> {
    let (ids, _, values) = resolve_matching_names_values(map, joint_names, false)?;
    let mut out = Array1::from_elem(dim, fallback);
    for (i, v) in ids.into_iter().zip(values) {
        out[i] = v;
    }
    Ok(out)
}

impl<S: Simulation> ActionTerm<S> for JointPositionAction {
    fn action_dim(&self) -> usize {
        self.joint_ids.len()
    }

    fn process_actions(&mut self, actions: ArrayView2<f32>) {
        self.raw.assign(&actions);
        self.processed = &self.raw * &self.scale + &self.offset;
        if let Some((lo, hi)) = &self.clip {
            for mut row in self.processed.rows_mut() {
                for ((v, &l), &h) in row.iter_mut().zip(lo.iter()).zip(hi.iter()) {
                    *v = v.clamp(l, h);
                }
            }
        }
    }

    fn apply_actions(&mut self, sim: &mut S) -> Result<(), EvalError> {
        let entity = sim
            .entity_mut(&self.entity)
            .ok_or_else(|| EvalError::UnknownEntity(self.entity.clone()))?;
        for (k, &j) in self.joint_ids.iter().enumerate() {
            entity
                .data
                .joint_pos_target
                .column_mut(j)
                .assign(&self.processed.column(k));
        }
        Ok(())
    }

    fn raw_actions(&self) -> ArrayView2<'_, f32> {
        self.raw.view()
    }

    fn processed_actions(&self) -> ArrayView2<'_, f32> {
        self.processed.view()
    }

    fn reset(&mut self, env_ids: &EnvIds) {
        for i in env_ids.iter() {
            self.raw.row_mut(i).fill(0.0);
        }
    }
}
