//! Task-specific terms for single-leg balancing.
//!
//! Which leg the robot stands on is drawn per episode by
//! [`RandomizeStandingLeg`] and stored under [`STANDING_LEG`]; every other
//! term reads it from there. `0` means standing on the left foot with the
//! right foot raised, `1` the opposite.

mod events;
mod observations;
mod rewards;
mod terminations;

pub use events::{RandomizeStandingLeg, STANDING_LEG};
pub use observations::{RaisedKneeHeight, StandingLegIndicator};
pub use rewards::{
    BaseStability, FootClearance, JointPosture, KneeHeightAboveThreshold,
    RaisedFootHeightOptimalRange, StaticStancePenalty, UprightPosture,
};
pub use terminations::RaisedFootContact;

use lockstep::{ArticulationData, ConfigError, EnvContext, Entity, EvalError, SceneEntityCfg, Simulation};

use crate::robot::{ANKLE_HEIGHT, FOOT_CONTACT_SENSORS, ROBOT};

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;

/// Standing leg of every environment, as a leg index.
pub(crate) fn standing_legs<S: Simulation>(env: &EnvContext<S>) -> Result<Vec<usize>, EvalError> {
    let choice = env.extras.read(&STANDING_LEG)?;
    Ok(choice
        .iter()
        .map(|&leg| if leg == RIGHT as i64 { RIGHT } else { LEFT })
        .collect())
}

#[inline]
pub(crate) fn other(leg: usize) -> usize {
    1 - leg
}

/// One body per leg, resolved once at construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LegBodies([usize; 2]);

impl LegBodies {
    pub(crate) fn resolve<S: Simulation>(sim: &S, names: [&str; 2]) -> Result<Self, ConfigError> {
        let asset = SceneEntityCfg::new(ROBOT)
            .with_bodies(names)
            .preserving_order()
            .resolve(sim)?;
        match asset.body_ids[..] {
            [left, right] => Ok(Self([left, right])),
            _ => Err(ConfigError::invalid(
                "body_names",
                format!("expected one body per leg, got {:?}", asset.body_names),
            )),
        }
    }

    #[inline]
    pub(crate) fn height(&self, data: &ArticulationData, env: usize, leg: usize) -> f32 {
        data.body_link_pos_w[[env, self.0[leg], 2]]
    }

    /// Sole height above ground for ankle bodies.
    #[inline]
    pub(crate) fn sole_height(&self, data: &ArticulationData, env: usize, leg: usize) -> f32 {
        self.height(data, env, leg) - ANKLE_HEIGHT
    }
}

/// Foot contact flags of one environment, left then right.
pub(crate) struct FootContacts<'a> {
    readings: [&'a ndarray::Array2<f32>; 2],
}

impl<'a> FootContacts<'a> {
    pub(crate) fn read(robot: &'a Entity) -> Result<Self, EvalError> {
        Ok(Self {
            readings: [
                robot.sensor(FOOT_CONTACT_SENSORS[LEFT])?,
                robot.sensor(FOOT_CONTACT_SENSORS[RIGHT])?,
            ],
        })
    }

    #[inline]
    pub(crate) fn in_contact(&self, env: usize, leg: usize) -> bool {
        self.readings[leg][[env, 0]] > 0.0
    }
}
