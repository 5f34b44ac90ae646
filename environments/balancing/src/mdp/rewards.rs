//! Balancing rewards. Penalties are positive; weight them negatively.

use ndarray::{Array1, Axis};

use lockstep::string::resolve_matching_names_values;
use lockstep::{
    ConfigError, EnvContext, EvalError, OrderedMap, RewardTerm, SceneEntityCfg, Simulation,
};

use super::{other, standing_legs, FootContacts, LegBodies};
use crate::robot::{ANKLE_BODIES, KNEE_BODIES, ROBOT};

/// Tilt tolerance of [`UprightPosture`], in units of `|g_z + 1|`.
const UPRIGHT_TOLERANCE: f32 = 0.25;

/// Knee-height error is clamped to this band before the exponential.
const KNEE_ERROR_BAND: f32 = 0.5;

/// `exp(clamp(h − threshold, ±0.5) / std²)` on the raised knee height `h`.
#[derive(Debug, Clone)]
pub struct KneeHeightAboveThreshold {
    knees: LegBodies,
    threshold: f32,
    inv_var: f32,
}

impl KneeHeightAboveThreshold {
    pub fn new<S: Simulation>(threshold: f32, std: f32, sim: &S) -> Result<Self, ConfigError> {
        if !(std > 0.0) {
            return Err(ConfigError::invalid("std", format!("{std} is not positive")));
        }
        Ok(Self {
            knees: LegBodies::resolve(sim, KNEE_BODIES)?,
            threshold,
            inv_var: 1.0 / (std * std),
        })
    }
}

impl<S: Simulation> RewardTerm<S> for KneeHeightAboveThreshold {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(ROBOT)?.data;
        let legs = standing_legs(env)?;
        Ok(Array1::from_shape_fn(env.num_envs(), |i| {
            let height = self.knees.height(data, i, other(legs[i]));
            let error = (height - self.threshold).clamp(-KNEE_ERROR_BAND, KNEE_ERROR_BAND);
            (error * self.inv_var).exp()
        }))
    }
}

/// `exp(−|g_z + 1| / 0.25)`: 1 when the base is level.
#[derive(Debug, Clone, Default)]
pub struct UprightPosture;

impl<S: Simulation> RewardTerm<S> for UprightPosture {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(ROBOT)?.data;
        Ok(data
            .projected_gravity_b
            .column(2)
            .mapv(|gz| (-(gz + 1.0).abs() / UPRIGHT_TOLERANCE).exp()))
    }
}

/// Squared norm of the body-frame base angular velocity, all three axes.
#[derive(Debug, Clone, Default)]
pub struct BaseStability;

impl<S: Simulation> RewardTerm<S> for BaseStability {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(ROBOT)?.data;
        Ok(data
            .root_link_ang_vel_b
            .mapv(|w| w * w)
            .sum_axis(Axis(1)))
    }
}

/// `exp(−mean((q − q_default)² / std²))` over the selected joints.
///
/// Every selected joint needs a tolerance from the pattern map; the
/// per-joint values are resolved once here.
#[derive(Debug, Clone)]
pub struct JointPosture {
    entity: String,
    joint_ids: Vec<usize>,
    inv_var: Array1<f32>,
}

impl JointPosture {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        std: &OrderedMap<f32>,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        let resolved = asset.resolve(sim)?;
        let (matched, _, values) = resolve_matching_names_values(std, &resolved.joint_names, false)?;
        if let Some(missing) = resolved
            .joint_names
            .iter()
            .enumerate()
            .find(|(k, _)| !matched.contains(k))
            .map(|(_, name)| name)
        {
            return Err(ConfigError::invalid("std", format!("no tolerance for joint {missing}")));
        }
        if let Some(bad) = values.iter().find(|&&s| !(s > 0.0)) {
            return Err(ConfigError::invalid("std", format!("{bad} is not positive")));
        }

        let mut inv_var = Array1::zeros(resolved.joint_ids.len());
        for (&k, &s) in matched.iter().zip(&values) {
            inv_var[k] = 1.0 / (s * s);
        }
        log::debug!(
            "joint_posture over {} joints of '{}'",
            resolved.joint_ids.len(),
            resolved.name
        );
        Ok(Self {
            entity: resolved.name,
            joint_ids: resolved.joint_ids,
            inv_var,
        })
    }
}

impl<S: Simulation> RewardTerm<S> for JointPosture {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(&self.entity)?.data;
        let count = self.joint_ids.len().max(1) as f32;
        Ok(Array1::from_shape_fn(env.num_envs(), |i| {
            let weighted: f32 = self
                .joint_ids
                .iter()
                .zip(self.inv_var.iter())
                .map(|(&j, &w)| {
                    let err = data.joint_pos[[i, j]] - data.default_joint_pos[[i, j]];
                    err * err * w
                })
                .sum();
            (-weighted / count).exp()
        }))
    }
}

/// Piecewise score of the raised sole height `h`:
///
/// - `h < min`: 0
/// - `min ≤ h < optimal`: linear ramp from 0 to 1
/// - `optimal ≤ h ≤ max`: 1
/// - `h > max`: falls by 1 per `max − optimal` of overshoot, floored at −1
#[derive(Debug, Clone)]
pub struct RaisedFootHeightOptimalRange {
    ankles: LegBodies,
    min_height: f32,
    optimal_height: f32,
    max_height: f32,
}

impl RaisedFootHeightOptimalRange {
    pub fn new<S: Simulation>(
        min_height: f32,
        optimal_height: f32,
        max_height: f32,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        if !(min_height < optimal_height && optimal_height < max_height) {
            return Err(ConfigError::invalid(
                "optimal_height",
                format!("need min < optimal < max, got {min_height} / {optimal_height} / {max_height}"),
            ));
        }
        Ok(Self {
            ankles: LegBodies::resolve(sim, ANKLE_BODIES)?,
            min_height,
            optimal_height,
            max_height,
        })
    }

    pub fn score(&self, height: f32) -> f32 {
        if height < self.min_height {
            0.0
        } else if height < self.optimal_height {
            (height - self.min_height) / (self.optimal_height - self.min_height)
        } else if height <= self.max_height {
            1.0
        } else {
            let overshoot = (height - self.max_height) / (self.max_height - self.optimal_height);
            (1.0 - overshoot).max(-1.0)
        }
    }
}

impl<S: Simulation> RewardTerm<S> for RaisedFootHeightOptimalRange {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let data = &env.entity(ROBOT)?.data;
        let legs = standing_legs(env)?;
        Ok(Array1::from_shape_fn(env.num_envs(), |i| {
            self.score(self.ankles.sole_height(data, i, other(legs[i])))
        }))
    }
}

/// 1 while the standing foot is down and the raised foot is off the ground.
#[derive(Debug, Clone, Default)]
pub struct FootClearance;

impl<S: Simulation> RewardTerm<S> for FootClearance {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let contacts = FootContacts::read(env.entity(ROBOT)?)?;
        let legs = standing_legs(env)?;
        Ok(Array1::from_shape_fn(env.num_envs(), |i| {
            let standing = legs[i];
            let cleared = contacts.in_contact(i, standing) && !contacts.in_contact(i, other(standing));
            if cleared {
                1.0
            } else {
                0.0
            }
        }))
    }
}

/// Squared horizontal base speed in the body frame. Discourages hopping
/// around on the standing foot.
#[derive(Debug, Clone, Default)]
pub struct StaticStancePenalty;

impl<S: Simulation> RewardTerm<S> for StaticStancePenalty {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<f32>, EvalError> {
        let vel = &env.entity(ROBOT)?.data.root_link_lin_vel_b;
        Ok(Array1::from_shape_fn(env.num_envs(), |i| {
            vel[[i, 0]] * vel[[i, 0]] + vel[[i, 1]] * vel[[i, 1]]
        }))
    }
}
