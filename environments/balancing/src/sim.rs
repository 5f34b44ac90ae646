//! Kinematic stand-in for the humanoid physics.
//!
//! Joints track their position targets with first-order dynamics. The root
//! drifts with damped linear and angular velocity, and its height is set by
//! the leg kinematics so the lowest sole always rests on the ground plane.
//! Knee and ankle body positions follow from a planar thigh/shank chain
//! rotated by the root orientation.

use ndarray::s;
use serde::{Deserialize, Serialize};

use lockstep::math::{quat_apply, quat_integrate};
use lockstep::{ArticulationData, ConfigError, EnvIds, Entity, EvalError, Simulation};

use crate::robot::{
    default_joint_pos, ANKLE_BODIES, ANKLE_HEIGHT, BODY_NAMES, FOOT_CONTACT_SENSORS,
    HIP_DROP, HIP_HALF_WIDTH, JOINT_NAMES, KNEE_BODIES, PHYSICS_DT, ROBOT, SHANK_LENGTH,
    THIGH_LENGTH, TORSO_OFFSET,
};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BipedSimCfg {
    /// Physics timestep (s)
    pub physics_dt: f32,
    /// Joint position tracking time constant (s)
    pub joint_time_constant: f32,
    /// Horizontal linear velocity decay rate (1/s)
    pub linear_damping: f32,
    /// Angular velocity decay rate (1/s)
    pub angular_damping: f32,
    /// Sole height below which a foot counts as in contact (m)
    pub contact_threshold: f32,
}

impl Default for BipedSimCfg {
    fn default() -> Self {
        Self {
            physics_dt: PHYSICS_DT,
            joint_time_constant: 0.02,
            linear_damping: 2.0,
            angular_damping: 4.0,
            contact_threshold: 0.005,
        }
    }
}

impl BipedSimCfg {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (param, value) in [
            ("physics_dt", self.physics_dt),
            ("joint_time_constant", self.joint_time_constant),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::invalid(param, format!("{value} is not positive")));
            }
        }
        for (param, value) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
            ("contact_threshold", self.contact_threshold),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::invalid(param, format!("{value} is negative")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Kinematics
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct LegJoints {
    hip_pitch: usize,
    hip_roll: usize,
    knee: usize,
}

#[derive(Debug, Clone, Copy)]
struct BodyIds {
    pelvis: usize,
    torso: usize,
    knees: [usize; 2],
    ankles: [usize; 2],
}

/// Lateral sign of each leg, left then right.
const LEG_SIDE: [f32; 2] = [1.0, -1.0];

/// Pelvis-frame positions of the knee and ankle joints of one leg.
///
/// Negative hip pitch swings the thigh forward; positive knee flexion folds
/// the shank back. Hip roll tilts the whole chain sideways.
pub fn leg_offsets(side: f32, hip_pitch: f32, hip_roll: f32, knee: f32) -> ([f32; 3], [f32; 3]) {
    let thigh = -hip_pitch;
    let shank = thigh - knee;
    let (roll_sin, roll_cos) = hip_roll.sin_cos();
    let knee_reach = THIGH_LENGTH * thigh.cos();
    let ankle_reach = knee_reach + SHANK_LENGTH * shank.cos();
    let knee_fwd = THIGH_LENGTH * thigh.sin();
    let ankle_fwd = knee_fwd + SHANK_LENGTH * shank.sin();
    let hip_y = side * HIP_HALF_WIDTH;
    (
        [knee_fwd, hip_y + knee_reach * roll_sin, -HIP_DROP - knee_reach * roll_cos],
        [ankle_fwd, hip_y + ankle_reach * roll_sin, -HIP_DROP - ankle_reach * roll_cos],
    )
}

/// Place the root on the ground and write body positions and contacts for
/// one environment.
fn place(
    data: &mut ArticulationData,
    legs: &[LegJoints; 2],
    bodies: &BodyIds,
    contact_threshold: f32,
    env: usize,
) {
    let q = data.root_quat(env);
    let mut knees = [[0.0f32; 3]; 2];
    let mut ankles = [[0.0f32; 3]; 2];
    for (leg, joints) in legs.iter().enumerate() {
        let (knee, ankle) = leg_offsets(
            LEG_SIDE[leg],
            data.joint_pos[[env, joints.hip_pitch]],
            data.joint_pos[[env, joints.hip_roll]],
            data.joint_pos[[env, joints.knee]],
        );
        knees[leg] = quat_apply(q, knee);
        ankles[leg] = quat_apply(q, ankle);
    }

    let lowest_sole = ankles[0][2].min(ankles[1][2]) - ANKLE_HEIGHT;
    data.root_link_pos_w[[env, 2]] = -lowest_sole;
    let root = [
        data.root_link_pos_w[[env, 0]],
        data.root_link_pos_w[[env, 1]],
        data.root_link_pos_w[[env, 2]],
    ];

    let torso = quat_apply(q, [0.0, 0.0, TORSO_OFFSET]);
    let mut write = |body: usize, offset: [f32; 3]| {
        for k in 0..3 {
            data.body_link_pos_w[[env, body, k]] = root[k] + offset[k];
        }
    };
    write(bodies.pelvis, [0.0; 3]);
    write(bodies.torso, torso);
    for leg in 0..2 {
        write(bodies.knees[leg], knees[leg]);
        write(bodies.ankles[leg], ankles[leg]);
    }

    for (leg, sensor) in FOOT_CONTACT_SENSORS.iter().enumerate() {
        let sole = root[2] + ankles[leg][2] - ANKLE_HEIGHT;
        if let Some(readings) = data.sensor_data.get_mut(*sensor) {
            readings[[env, 0]] = if sole < contact_threshold { 1.0 } else { 0.0 };
        }
    }
}

// ============================================================================
// BipedSim
// ============================================================================

/// Batched humanoid scene with a single entity, [`ROBOT`].
pub struct BipedSim {
    cfg: BipedSimCfg,
    robot: Entity,
    legs: [LegJoints; 2],
    bodies: BodyIds,
}

impl BipedSim {
    pub fn new(num_envs: usize, cfg: &BipedSimCfg) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut robot = Entity::new(ROBOT, names(&JOINT_NAMES), names(&BODY_NAMES), num_envs);

        let legs = [leg_joints(&robot, "left")?, leg_joints(&robot, "right")?];
        let (knees, _) = robot.find_bodies(&names(&KNEE_BODIES), true)?;
        let (ankles, _) = robot.find_bodies(&names(&ANKLE_BODIES), true)?;
        let (core, _) = robot.find_bodies(&names(&["pelvis", "torso_link"]), true)?;
        let bodies = BodyIds {
            pelvis: core[0],
            torso: core[1],
            knees: [knees[0], knees[1]],
            ankles: [ankles[0], ankles[1]],
        };

        let data = &mut robot.data;
        for (j, name) in JOINT_NAMES.iter().enumerate() {
            data.default_joint_pos.column_mut(j).fill(default_joint_pos(name));
        }
        data.joint_pos.assign(&data.default_joint_pos);
        data.joint_pos_target.assign(&data.default_joint_pos);
        for sensor in FOOT_CONTACT_SENSORS {
            data.sensor_data
                .insert(sensor.to_string(), ndarray::Array2::zeros((num_envs, 1)));
        }
        for env in 0..num_envs {
            place(data, &legs, &bodies, cfg.contact_threshold, env);
        }
        let standing_height = data.root_link_pos_w.column(2).to_owned();
        data.default_root_state.column_mut(2).assign(&standing_height);
        data.update_derived();

        log::debug!(
            "biped sim: {num_envs} envs, standing height {:.3} m",
            standing_height.get(0).copied().unwrap_or_default()
        );

        Ok(Self {
            cfg: cfg.clone(),
            robot,
            legs,
            bodies,
        })
    }

    pub fn config(&self) -> &BipedSimCfg {
        &self.cfg
    }

    pub fn robot(&self) -> &Entity {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut Entity {
        &mut self.robot
    }

    /// Sole heights above ground of one environment, left then right.
    pub fn sole_heights(&self, env: usize) -> [f32; 2] {
        let pos = &self.robot.data.body_link_pos_w;
        [
            pos[[env, self.bodies.ankles[0], 2]] - ANKLE_HEIGHT,
            pos[[env, self.bodies.ankles[1], 2]] - ANKLE_HEIGHT,
        ]
    }
}

fn leg_joints(robot: &Entity, side: &str) -> Result<LegJoints, ConfigError> {
    let patterns = ["hip_pitch", "hip_roll", "knee"]
        .iter()
        .map(|j| format!("{side}_{j}_joint"))
        .collect::<Vec<_>>();
    let (ids, _) = robot.find_joints(&patterns, true)?;
    Ok(LegJoints {
        hip_pitch: ids[0],
        hip_roll: ids[1],
        knee: ids[2],
    })
}

impl Simulation for BipedSim {
    fn num_envs(&self) -> usize {
        self.robot.data.num_envs()
    }

    fn physics_dt(&self) -> f32 {
        self.cfg.physics_dt
    }

    fn entity(&self, name: &str) -> Option<&Entity> {
        (name == ROBOT).then_some(&self.robot)
    }

    fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        (name == ROBOT).then_some(&mut self.robot)
    }

    fn step(&mut self) -> Result<(), EvalError> {
        let dt = self.cfg.physics_dt;
        let tracking = 1.0 - (-dt / self.cfg.joint_time_constant).exp();
        let linear_decay = (-self.cfg.linear_damping * dt).exp();
        let angular_decay = (-self.cfg.angular_damping * dt).exp();

        let data = &mut self.robot.data;
        data.joint_vel = (&data.joint_pos_target - &data.joint_pos) * (tracking / dt);
        data.joint_pos.scaled_add(dt, &data.joint_vel);
        data.root_link_ang_vel_w.mapv_inplace(|w| w * angular_decay);
        data.root_link_lin_vel_w
            .slice_mut(s![.., 0..2])
            .mapv_inplace(|v| v * linear_decay);

        for env in 0..data.num_envs() {
            for k in 0..2 {
                data.root_link_pos_w[[env, k]] += data.root_link_lin_vel_w[[env, k]] * dt;
            }
            let w = data.root_link_ang_vel_w.row(env);
            let q = quat_integrate(data.root_quat(env), [w[0], w[1], w[2]], dt);
            data.root_link_quat_w
                .row_mut(env)
                .assign(&ndarray::aview1(&q));

            let height = data.root_link_pos_w[[env, 2]];
            place(data, &self.legs, &self.bodies, self.cfg.contact_threshold, env);
            data.root_link_lin_vel_w[[env, 2]] = (data.root_link_pos_w[[env, 2]] - height) / dt;
        }
        data.update_derived();
        Ok(())
    }

    fn forward(&mut self) -> Result<(), EvalError> {
        let data = &mut self.robot.data;
        for env in 0..data.num_envs() {
            place(data, &self.legs, &self.bodies, self.cfg.contact_threshold, env);
        }
        data.update_derived();
        Ok(())
    }

    fn reset(&mut self, env_ids: &EnvIds) {
        let data = &mut self.robot.data;
        for env in env_ids.iter() {
            let default_pos = data.default_joint_pos.row(env).to_owned();
            data.joint_pos.row_mut(env).assign(&default_pos);
            data.joint_pos_target.row_mut(env).assign(&default_pos);
            data.joint_vel.row_mut(env).fill(0.0);
            let root = data.default_root_state.row(env).to_owned();
            data.root_link_pos_w.row_mut(env).assign(&root.slice(s![0..3]));
            data.root_link_quat_w.row_mut(env).assign(&root.slice(s![3..7]));
            data.root_link_lin_vel_w.row_mut(env).assign(&root.slice(s![7..10]));
            data.root_link_ang_vel_w.row_mut(env).assign(&root.slice(s![10..13]));
        }
    }
}
