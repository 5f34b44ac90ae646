use serde::{Deserialize, Serialize};

use super::{Entity, Simulation};
use crate::error::ConfigError;

/// Reference to a scene entity, optionally narrowed to joints and bodies by
/// regex pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntityCfg {
    pub name: String,
    #[serde(default)]
    pub joint_names: Option<Vec<String>>,
    #[serde(default)]
    pub body_names: Option<Vec<String>>,
    #[serde(default)]
    pub preserve_order: bool,
}

impl SceneEntityCfg {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joint_names: None,
            body_names: None,
            preserve_order: false,
        }
    }

    pub fn with_joints<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.joint_names = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_bodies<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.body_names = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn preserving_order(mut self) -> Self {
        self.preserve_order = true;
        self
    }

    /// Resolve names against the simulation. Unset selections cover every
    /// joint or body of the entity.
    pub fn resolve<S: Simulation>(&self, sim: &S) -> Result<ResolvedEntity, ConfigError> {
        let entity = sim
            .entity(&self.name)
            .ok_or_else(|| ConfigError::UnknownEntity(self.name.clone()))?;
        self.resolve_on(entity)
    }

    pub fn resolve_on(&self, entity: &Entity) -> Result<ResolvedEntity, ConfigError> {
        let (joint_ids, joint_names) = match &self.joint_names {
            Some(patterns) => entity.find_joints(patterns, self.preserve_order)?,
            None => (
                (0..entity.num_joints()).collect(),
                entity.joint_names().to_vec(),
            ),
        };
        let (body_ids, body_names) = match &self.body_names {
            Some(patterns) => entity.find_bodies(patterns, self.preserve_order)?,
            None => (
                (0..entity.num_bodies()).collect(),
                entity.body_names().to_vec(),
            ),
        };
        Ok(ResolvedEntity {
            name: self.name.clone(),
            joint_ids,
            joint_names,
            body_ids,
            body_names,
        })
    }
}

/// A [`SceneEntityCfg`] with its patterns resolved to indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    pub name: String,
    pub joint_ids: Vec<usize>,
    pub joint_names: Vec<String>,
    pub body_ids: Vec<usize>,
    pub body_names: Vec<String>,
}

impl ResolvedEntity {
    pub fn num_joints(&self) -> usize {
        self.joint_ids.len()
    }
}
