//! Articulated entities and their batched state buffers.

use std::collections::BTreeMap;

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EvalError};
use crate::math::{projected_gravity, quat_apply_inverse};
use crate::string::resolve_matching_names;

// ============================================================================
// ArticulationData
// ============================================================================

/// Batched state of one articulated entity.
///
/// All arrays are row-per-environment. Root quantities use the link frame:
/// `_w` suffixes are world frame, `_b` suffixes body frame. Body-frame and
/// gravity fields are derived; call [`ArticulationData::update_derived`]
/// after writing root state.
#[derive(Debug, Clone)]
pub struct ArticulationData {
    /// Default root state `(N, 13)`: position, quaternion, linear and angular velocity.
    pub default_root_state: Array2<f32>,
    pub default_joint_pos: Array2<f32>,
    pub default_joint_vel: Array2<f32>,

    pub joint_pos: Array2<f32>,
    pub joint_vel: Array2<f32>,
    pub joint_pos_target: Array2<f32>,

    pub root_link_pos_w: Array2<f32>,
    pub root_link_quat_w: Array2<f32>,
    pub root_link_lin_vel_w: Array2<f32>,
    pub root_link_ang_vel_w: Array2<f32>,

    pub root_link_lin_vel_b: Array2<f32>,
    pub root_link_ang_vel_b: Array2<f32>,
    pub projected_gravity_b: Array2<f32>,

    /// Body positions `(N, B, 3)`.
    pub body_link_pos_w: Array3<f32>,

    /// Named per-environment sensor readings, `(N, D)` each.
    pub sensor_data: BTreeMap<String, Array2<f32>>,
}

impl ArticulationData {
    pub fn new(num_envs: usize, num_joints: usize, num_bodies: usize) -> Self {
        let mut quat = Array2::zeros((num_envs, 4));
        quat.column_mut(0).fill(1.0);
        let mut default_root_state = Array2::zeros((num_envs, 13));
        default_root_state.column_mut(3).fill(1.0);
        let mut gravity = Array2::zeros((num_envs, 3));
        gravity.column_mut(2).fill(-1.0);

        Self {
            default_root_state,
            default_joint_pos: Array2::zeros((num_envs, num_joints)),
            default_joint_vel: Array2::zeros((num_envs, num_joints)),
            joint_pos: Array2::zeros((num_envs, num_joints)),
            joint_vel: Array2::zeros((num_envs, num_joints)),
            joint_pos_target: Array2::zeros((num_envs, num_joints)),
            root_link_pos_w: Array2::zeros((num_envs, 3)),
            root_link_quat_w: quat,
            root_link_lin_vel_w: Array2::zeros((num_envs, 3)),
            root_link_ang_vel_w: Array2::zeros((num_envs, 3)),
            root_link_lin_vel_b: Array2::zeros((num_envs, 3)),
            root_link_ang_vel_b: Array2::zeros((num_envs, 3)),
            projected_gravity_b: gravity,
            body_link_pos_w: Array3::zeros((num_envs, num_bodies, 3)),
            sensor_data: BTreeMap::new(),
        }
    }

    pub fn num_envs(&self) -> usize {
        self.joint_pos.nrows()
    }

    /// Root quaternion of one environment.
    #[inline]
    pub fn root_quat(&self, env: usize) -> [f32; 4] {
        let q = self.root_link_quat_w.row(env);
        [q[0], q[1], q[2], q[3]]
    }

    /// Recompute body-frame velocities and projected gravity from world state.
    pub fn update_derived(&mut self) {
        for i in 0..self.num_envs() {
            let q = self.root_quat(i);
            let lin = self.root_link_lin_vel_w.row(i);
            let ang = self.root_link_ang_vel_w.row(i);
            let lin_b = quat_apply_inverse(q, [lin[0], lin[1], lin[2]]);
            let ang_b = quat_apply_inverse(q, [ang[0], ang[1], ang[2]]);
            let g = projected_gravity(q);
            for k in 0..3 {
                self.root_link_lin_vel_b[[i, k]] = lin_b[k];
                self.root_link_ang_vel_b[[i, k]] = ang_b[k];
                self.projected_gravity_b[[i, k]] = g[k];
            }
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A named articulation in the scene.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    joint_names: Vec<String>,
    body_names: Vec<String>,
    pub data: ArticulationData,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        joint_names: Vec<String>,
        body_names: Vec<String>,
        num_envs: usize,
    ) -> Self {
        let data = ArticulationData::new(num_envs, joint_names.len(), body_names.len());
        Self {
            name: name.into(),
            joint_names,
            body_names,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn body_names(&self) -> &[String] {
        &self.body_names
    }

    pub fn num_joints(&self) -> usize {
        self.joint_names.len()
    }

    pub fn num_bodies(&self) -> usize {
        self.body_names.len()
    }

    pub fn find_joints(
        &self,
        patterns: &[String],
        preserve_order: bool,
    ) -> Result<(Vec<usize>, Vec<String>), ConfigError> {
        resolve_matching_names(patterns, &self.joint_names, preserve_order)
    }

    pub fn find_bodies(
        &self,
        patterns: &[String],
        preserve_order: bool,
    ) -> Result<(Vec<usize>, Vec<String>), ConfigError> {
        resolve_matching_names(patterns, &self.body_names, preserve_order)
    }

    pub fn sensor(&self, sensor: &str) -> Result<&Array2<f32>, EvalError> {
        self.data
            .sensor_data
            .get(sensor)
            .ok_or_else(|| EvalError::UnknownSensor {
                entity: self.name.clone(),
                sensor: sensor.to_string(),
            })
    }

    /// Write root pose rows `(k, 7)` for the environments in `env_ids`, in
    /// ascending order.
    pub fn write_root_pose(&mut self, env_ids: &EnvIds, pose: ArrayView2<f32>) {
        debug_assert_eq!(pose.nrows(), env_ids.count());
        for (row, env) in env_ids.iter().enumerate() {
            self.data
                .root_link_pos_w
                .row_mut(env)
                .assign(&pose.slice(s![row, 0..3]));
            self.data
                .root_link_quat_w
                .row_mut(env)
                .assign(&pose.slice(s![row, 3..7]));
        }
    }

    /// Write root velocity rows `(k, 6)`: linear then angular, world frame.
    pub fn write_root_velocity(&mut self, env_ids: &EnvIds, velocity: ArrayView2<f32>) {
        debug_assert_eq!(velocity.nrows(), env_ids.count());
        for (row, env) in env_ids.iter().enumerate() {
            self.data
                .root_link_lin_vel_w
                .row_mut(env)
                .assign(&velocity.slice(s![row, 0..3]));
            self.data
                .root_link_ang_vel_w
                .row_mut(env)
                .assign(&velocity.slice(s![row, 3..6]));
        }
    }

    /// Write joint positions and velocities `(k, J)`. Position targets follow
    /// the written positions.
    pub fn write_joint_state(
        &mut self,
        env_ids: &EnvIds,
        position: ArrayView2<f32>,
        velocity: ArrayView2<f32>,
    ) {
        debug_assert_eq!(position.nrows(), env_ids.count());
        for (row, env) in env_ids.iter().enumerate() {
            self.data.joint_pos.row_mut(env).assign(&position.row(row));
            self.data.joint_vel.row_mut(env).assign(&velocity.row(row));
            self.data
                .joint_pos_target
                .row_mut(env)
                .assign(&position.row(row));
        }
    }

    /// Default root state rows for `env_ids`.
    pub fn default_root_state(&self, env_ids: &EnvIds) -> Array2<f32> {
        self.data
            .default_root_state
            .select(Axis(0), &env_ids.to_vec())
    }
}
