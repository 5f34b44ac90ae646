//! Common event terms: root and joint resets, velocity pushes.
//!
//! Samples are drawn environment by environment in ascending index order, and
//! within an environment in axis order, so a seed fixes every draw.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EvalError};
use crate::managers::EventTerm;
use crate::math::{quat_from_euler_xyz, quat_mul};
use crate::rng::{random_uniform, SimRng};
use crate::scene::{ResolvedEntity, SceneEntityCfg, Simulation};

/// Uniform ranges over the six pose or velocity axes. Unset axes sample 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisRanges {
    #[serde(default)]
    pub x: Option<(f32, f32)>,
    #[serde(default)]
    pub y: Option<(f32, f32)>,
    #[serde(default)]
    pub z: Option<(f32, f32)>,
    #[serde(default)]
    pub roll: Option<(f32, f32)>,
    #[serde(default)]
    pub pitch: Option<(f32, f32)>,
    #[serde(default)]
    pub yaw: Option<(f32, f32)>,
}

impl AxisRanges {
    pub fn with_x(mut self, lo: f32, hi: f32) -> Self {
        self.x = Some((lo, hi));
        self
    }

    pub fn with_y(mut self, lo: f32, hi: f32) -> Self {
        self.y = Some((lo, hi));
        self
    }

    pub fn with_z(mut self, lo: f32, hi: f32) -> Self {
        self.z = Some((lo, hi));
        self
    }

    pub fn with_roll(mut self, lo: f32, hi: f32) -> Self {
        self.roll = Some((lo, hi));
        self
    }

    pub fn with_pitch(mut self, lo: f32, hi: f32) -> Self {
        self.pitch = Some((lo, hi));
        self
    }

    pub fn with_yaw(mut self, lo: f32, hi: f32) -> Self {
        self.yaw = Some((lo, hi));
        self
    }

    fn bounds(&self) -> [(f32, f32); 6] {
        [self.x, self.y, self.z, self.roll, self.pitch, self.yaw].map(|r| r.unwrap_or((0.0, 0.0)))
    }

    fn validate(&self, param: &str) -> Result<(), ConfigError> {
        for (lo, hi) in self.bounds() {
            if lo > hi {
                return Err(ConfigError::invalid(param, format!("range ({lo}, {hi}) is inverted")));
            }
        }
        Ok(())
    }

    fn sample(&self, rng: &mut SimRng) -> [f32; 6] {
        self.bounds().map(|(lo, hi)| random_uniform(rng, lo, hi))
    }
}

/// Default root state offset by uniform pose and velocity perturbations.
#[derive(Debug, Clone)]
pub struct ResetRootStateUniform {
    entity: String,
    pose_range: AxisRanges,
    velocity_range: AxisRanges,
}

impl ResetRootStateUniform {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        pose_range: AxisRanges,
        velocity_range: AxisRanges,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        pose_range.validate("pose_range")?;
        velocity_range.validate("velocity_range")?;
        Ok(Self {
            entity: asset.resolve(sim)?.name,
            pose_range,
            velocity_range,
        })
    }
}

impl<S: Simulation> EventTerm<S> for ResetRootStateUniform {
    fn apply(&mut self, env: &mut EnvContext<S>, env_ids: &EnvIds) -> Result<(), EvalError> {
        let defaults = env.entity(&self.entity)?.default_root_state(env_ids);
        let k = env_ids.count();
        let mut pose = Array2::zeros((k, 7));
        let mut velocity = Array2::zeros((k, 6));
        for row in 0..k {
            let d = defaults.row(row);
            let p = self.pose_range.sample(&mut env.rng);
            let v = self.velocity_range.sample(&mut env.rng);
            let delta = quat_from_euler_xyz(p[3], p[4], p[5]);
            let quat = quat_mul([d[3], d[4], d[5], d[6]], delta);
            for a in 0..3 {
                pose[[row, a]] = d[a] + p[a];
            }
            for a in 0..4 {
                pose[[row, 3 + a]] = quat[a];
            }
            for a in 0..6 {
                velocity[[row, a]] = d[7 + a] + v[a];
            }
        }
        let entity = env.entity_mut(&self.entity)?;
        entity.write_root_pose(env_ids, pose.view());
        entity.write_root_velocity(env_ids, velocity.view());
        Ok(())
    }
}

/// Default joint state scaled by uniform factors.
#[derive(Debug, Clone)]
pub struct ResetJointsByScale {
    asset: ResolvedEntity,
    position_range: (f32, f32),
    velocity_range: (f32, f32),
}

impl ResetJointsByScale {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        position_range: (f32, f32),
        velocity_range: (f32, f32),
        sim: &S,
    ) -> Result<Self, ConfigError> {
        for (param, (lo, hi)) in [("position_range", position_range), ("velocity_range", velocity_range)] {
            if lo > hi {
                return Err(ConfigError::invalid(param, format!("range ({lo}, {hi}) is inverted")));
            }
        }
        Ok(Self {
            asset: asset.resolve(sim)?,
            position_range,
            velocity_range,
        })
    }
}

impl<S: Simulation> EventTerm<S> for ResetJointsByScale {
    fn apply(&mut self, env: &mut EnvContext<S>, env_ids: &EnvIds) -> Result<(), EvalError> {
        let rows = env_ids.to_vec();
        let data = &env.entity(&self.asset.name)?.data;
        let mut position = data.default_joint_pos.select(Axis(0), &rows);
        let mut velocity = data.default_joint_vel.select(Axis(0), &rows);
        let (p_lo, p_hi) = self.position_range;
        let (v_lo, v_hi) = self.velocity_range;
        for r in 0..rows.len() {
            for &j in &self.asset.joint_ids {
                position[[r, j]] *= random_uniform(&mut env.rng, p_lo, p_hi);
                velocity[[r, j]] *= random_uniform(&mut env.rng, v_lo, v_hi);
            }
        }
        let entity = env.entity_mut(&self.asset.name)?;
        entity.write_joint_state(env_ids, position.view(), velocity.view());
        Ok(())
    }
}

/// Add a uniform perturbation to the current root velocity.
#[derive(Debug, Clone)]
pub struct PushBySettingVelocity {
    entity: String,
    velocity_range: AxisRanges,
}

impl PushBySettingVelocity {
    pub fn new<S: Simulation>(
        asset: &SceneEntityCfg,
        velocity_range: AxisRanges,
        sim: &S,
    ) -> Result<Self, ConfigError> {
        velocity_range.validate("velocity_range")?;
        Ok(Self {
            entity: asset.resolve(sim)?.name,
            velocity_range,
        })
    }
}

impl<S: Simulation> EventTerm<S> for PushBySettingVelocity {
    fn apply(&mut self, env: &mut EnvContext<S>, env_ids: &EnvIds) -> Result<(), EvalError> {
        let rows = env_ids.to_vec();
        let data = &env.entity(&self.entity)?.data;
        let lin = data.root_link_lin_vel_w.select(Axis(0), &rows);
        let ang = data.root_link_ang_vel_w.select(Axis(0), &rows);
        let mut velocity = Array2::zeros((rows.len(), 6));
        for r in 0..rows.len() {
            let dv = self.velocity_range.sample(&mut env.rng);
            for a in 0..3 {
                velocity[[r, a]] = lin[[r, a]] + dv[a];
                velocity[[r, 3 + a]] = ang[[r, a]] + dv[3 + a];
            }
        }
        env.entity_mut(&self.entity)?
            .write_root_velocity(env_ids, velocity.view());
        Ok(())
    }
}
