use ndarray::Array2;

use lockstep::{ConfigError, EnvContext, EvalError, ObservationTerm, Simulation};

use super::{other, standing_legs, LegBodies};
use crate::robot::{KNEE_BODIES, ROBOT};

/// One-hot standing leg, `(N, 2)`: `[1, 0]` when standing on the left foot.
#[derive(Debug, Clone, Default)]
pub struct StandingLegIndicator;

impl<S: Simulation> ObservationTerm<S> for StandingLegIndicator {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array2<f32>, EvalError> {
        let legs = standing_legs(env)?;
        let mut out = Array2::zeros((env.num_envs(), 2));
        for (i, &leg) in legs.iter().enumerate() {
            out[[i, leg]] = 1.0;
        }
        Ok(out)
    }
}

/// World height of the raised leg's knee, `(N, 1)`.
#[derive(Debug, Clone)]
pub struct RaisedKneeHeight {
    knees: LegBodies,
}

impl RaisedKneeHeight {
    pub fn new<S: Simulation>(sim: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            knees: LegBodies::resolve(sim, KNEE_BODIES)?,
        })
    }
}

impl<S: Simulation> ObservationTerm<S> for RaisedKneeHeight {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array2<f32>, EvalError> {
        let data = &env.entity(ROBOT)?.data;
        let legs = standing_legs(env)?;
        Ok(Array2::from_shape_fn((env.num_envs(), 1), |(i, _)| {
            self.knees.height(data, i, other(legs[i]))
        }))
    }
}
