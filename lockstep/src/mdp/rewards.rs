//! Common reward terms. Penalties are returned positive; give them a
//! negative weight.

use ndarray::{s, Array1, Axis};

use crate::context::EnvContext;
use crate::error::{ConfigError, EvalError};
use crate::managers::RewardTerm;
use crate::scene::{ResolvedEntity, SceneEntityCfg, Simulation};

/// Constant 1 for every environment.
#[derive(Debug, Clone, Default)]
pub struct IsAlive;

impl<S: Simulation> RewardTerm<S> for IsAlive {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        Ok(Array1::ones(env.num_envs()))
    }
}

/// Squared norm of the action change since the previous step.
#[derive(Debug, Clone, Default)]
pub struct ActionRateL2;

impl<S: Simulation> RewardTerm<S> for ActionRateL2 {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let diff = env.actions.action() - env.actions.prev_action();
        Ok(diff.mapv(|v| v * v).sum_axis(Axis(1)))
    }
}

/// Squared norm of the action.
#[derive(Debug, Clone, Default)]
pub struct ActionL2;

impl<S: Simulation> RewardTerm<S> for ActionL2 {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        Ok(env.actions.action().mapv(|v| v * v).sum_axis(Axis(1)))
    }
}

/// Squared norm of the selected joint velocities.
#[derive(Debug, Clone)]
pub struct JointVelL2 {
    asset: ResolvedEntity,
}

impl JointVelL2 {
    pub fn new<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            asset: asset.resolve(sim)?,
        })
    }
}

impl<S: Simulation> RewardTerm<S> for JointVelL2 {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(&self.asset.name)?.data;
        Ok(data
            .joint_vel
            .select(Axis(1), &self.asset.joint_ids)
            .mapv(|v| v * v)
            .sum_axis(Axis(1)))
    }
}

/// Squared roll and pitch rates in the body frame.
#[derive(Debug, Clone)]
pub struct AngVelXyL2 {
    entity: String,
}

impl AngVelXyL2 {
    pub fn new<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            entity: asset.resolve(sim)?.name,
        })
    }
}

impl<S: Simulation> RewardTerm<S> for AngVelXyL2 {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(&self.entity)?.data;
        Ok(data
            .root_link_ang_vel_b
            .slice(s![.., 0..2])
            .mapv(|v| v * v)
            .sum_axis(Axis(1)))
    }
}

/// Squared xy components of projected gravity; zero when level.
#[derive(Debug, Clone)]
pub struct FlatOrientationL2 {
    entity: String,
}

impl FlatOrientationL2 {
    pub fn new<S: Simulation>(asset: &SceneEntityCfg, sim: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            entity: asset.resolve(sim)?.name,
        })
    }
}

impl<S: Simulation> RewardTerm<S> for FlatOrientationL2 {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(&self.entity)?.data;
        Ok(data
            .projected_gravity_b
            .slice(s![.., 0..2])
            .mapv(|v| v * v)
            .sum_axis(Axis(1)))
    }
}
