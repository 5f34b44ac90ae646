//! Common termination terms.

use ndarray::Array1;

use crate::context::EnvContext;
use crate::error::{ConfigError, EvalError};
use crate::managers::TerminationTerm;
use crate::scene::{SceneEntityCfg, Simulation};

/// Episode length reached `max_episode_length`. Register with `time_out`.
#[derive(Debug, Clone, Default)]
pub struct TimeOut;

impl<S: Simulation> TerminationTerm<S> for TimeOut {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<bool>, EvalError> {
        let limit = env.max_episode_length();
        Ok(env.episode_length_buf.mapv(|n| n >= limit))
    }
}

/// Tilt from upright exceeds `limit_angle` radians.
#[derive(Debug, Clone)]
pub struct BadOrientation {
    entity: String,
    limit_angle: f32,
}

impl BadOrientation {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        limit_angle: f32,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        if !(limit_angle > 0.0) {
            return Err(ConfigError::invalid(
                "limit_angle",
                format!("{limit_angle} is not positive"),
            ));
        }
        Ok(Self {
            entity: asset.resolve(sim)?.name,
            limit_angle,
        })
    }
}

impl<S: Simulation> TerminationTerm<S> for BadOrientation {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<bool>, EvalError> {
        let data = &env.entity(&self.entity)?.data;
        Ok(data
            .projected_gravity_b
            .column(2)
            .mapv(|gz| (-gz).clamp(-1.0, 1.0).acos().abs() > self.limit_angle))
    }
}

/// Root height below `minimum_height` meters.
#[derive(Debug, Clone)]
pub struct RootHeightBelowMinimum {
    entity: String,
    minimum_height: f32,
}

impl RootHeightBelowMinimum {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        minimum_height: f32,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            entity: asset.resolve(sim)?.name,
            minimum_height,
        })
    }
}

impl<S: Simulation> TerminationTerm<S> for RootHeightBelowMinimum {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<bool>, EvalError> {
        let data = &env.entity(&self.entity)?.data;
        Ok(data
            .root_link_pos_w
            .column(2)
            .mapv(|z| z < self.minimum_height))
    }
}
