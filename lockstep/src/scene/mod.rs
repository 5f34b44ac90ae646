//! Scene interface consumed by the managers.
//!
//! The runtime never integrates physics itself. A [`Simulation`] owns the
//! batched entity state and advances it; terms read and write that state
//! through [`Entity`] handles.

mod entity;
mod entity_cfg;

pub use entity::{ArticulationData, Entity};
pub use entity_cfg::{ResolvedEntity, SceneEntityCfg};

use crate::env_ids::EnvIds;
use crate::error::EvalError;

/// Batched physics backend.
pub trait Simulation: 'static {
    fn num_envs(&self) -> usize;

    /// Physics timestep in seconds.
    fn physics_dt(&self) -> f32;

    fn entity(&self, name: &str) -> Option<&Entity>;

    fn entity_mut(&mut self, name: &str) -> Option<&mut Entity>;

    /// Advance one physics substep.
    fn step(&mut self) -> Result<(), EvalError>;

    /// Refresh derived quantities after state was written directly.
    fn forward(&mut self) -> Result<(), EvalError> {
        Ok(())
    }

    /// Restore default state for the environments in `env_ids`.
    fn reset(&mut self, env_ids: &EnvIds);
}
