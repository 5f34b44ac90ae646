//! Common observation terms.

use ndarray::{Array2, Axis};

use crate::context::EnvContext;
use crate::error::{ConfigError, EvalError};
use crate::managers::ObservationTerm;
use crate::scene::{ResolvedEntity, SceneEntityCfg, Simulation};

/// Which root quantity a [`RootState`] term reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootQuantity {
    LinVelB,
    AngVelB,
    ProjectedGravity,
}

/// Root linear velocity, angular velocity or projected gravity in the body
/// frame, `(N, 3)`.
#[derive(Debug, Clone)]
pub struct RootState {
    entity: String,
    quantity: RootQuantity,
}

impl RootState {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        quantity: RootQuantity,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        let resolved = asset.resolve(sim)?;
        Ok(Self {
            entity: resolved.name,
            quantity,
        })
    }

    pub fn base_lin_vel<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Self::new(asset, RootQuantity::LinVelB, sim)
    }

    pub fn base_ang_vel<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Self::new(asset, RootQuantity::AngVelB, sim)
    }

    pub fn projected_gravity<S: Simulation>(
        asset: &SceneEntityCfg,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        Self::new(asset, RootQuantity::ProjectedGravity, sim)
    }
}

impl<S: Simulation> ObservationTerm<S> for RootState {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array2<f32>, EvalError> {
        let data = &env.entity(&self.entity)?.data;
        Ok(match self.quantity {
            RootQuantity::LinVelB => data.root_link_lin_vel_b.clone(),
            RootQuantity::AngVelB => data.root_link_ang_vel_b.clone(),
            RootQuantity::ProjectedGravity => data.projected_gravity_b.clone(),
        })
    }
}

/// Joint positions or velocities relative to their defaults, `(N, J)` over
/// the selected joints.
#[derive(Debug, Clone)]
pub struct JointStateRel {
    asset: ResolvedEntity,
    velocity: bool,
}

impl JointStateRel {
    pub fn joint_pos_rel<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            asset: asset.resolve(sim)?,
            velocity: false,
        })
    }

    pub fn joint_vel_rel<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            asset: asset.resolve(sim)?,
            velocity: true,
        })
    }
}

impl<S: Simulation> ObservationTerm<S> for JointStateRel {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array2<f32>, EvalError> {
        let data = &env.entity(&self.asset.name)?.data;
        let ids = &self.asset.joint_ids;
        let (current, default) = if self.velocity {
            (&data.joint_vel, &data.default_joint_vel)
        } else {
            (&data.joint_pos, &data.default_joint_pos)
        };
        Ok(current.select(Axis(1), ids) - default.select(Axis(1), ids))
    }
}

/// The last action, whole or one term's block.
#[derive(Debug, Clone, Default)]
pub struct LastAction {
    term: Option<String>,
}

impl LastAction {
    pub fn new(term: Option<String>) -> Self {
        Self { term }
    }
}

impl<S: Simulation> ObservationTerm<S> for LastAction {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array2<f32>, EvalError> {
        match &self.term {
            None => Ok(env.actions.action().clone()),
            Some(term) => env
                .actions
                .term_action(term)
                .map(|a| a.to_owned())
                .ok_or_else(|| EvalError::Failed(format!("no action term '{term}'"))),
        }
    }
}
