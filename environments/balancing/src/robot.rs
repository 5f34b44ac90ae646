//! Unitree G1 (29 DoF) description used by the balancing task.
//!
//! Joint order is left leg, right leg, waist, left arm, right arm. Lengths
//! are rounded link dimensions of the real robot; they only feed the
//! kinematic stand-in in [`crate::sim`].

use lockstep::OrderedMap;

/// Scene name of the humanoid entity.
pub const ROBOT: &str = "robot";

pub const NUM_JOINTS: usize = 29;

pub const JOINT_NAMES: [&str; NUM_JOINTS] = [
    "left_hip_pitch_joint",
    "left_hip_roll_joint",
    "left_hip_yaw_joint",
    "left_knee_joint",
    "left_ankle_pitch_joint",
    "left_ankle_roll_joint",
    "right_hip_pitch_joint",
    "right_hip_roll_joint",
    "right_hip_yaw_joint",
    "right_knee_joint",
    "right_ankle_pitch_joint",
    "right_ankle_roll_joint",
    "waist_yaw_joint",
    "waist_roll_joint",
    "waist_pitch_joint",
    "left_shoulder_pitch_joint",
    "left_shoulder_roll_joint",
    "left_shoulder_yaw_joint",
    "left_elbow_joint",
    "left_wrist_roll_joint",
    "left_wrist_pitch_joint",
    "left_wrist_yaw_joint",
    "right_shoulder_pitch_joint",
    "right_shoulder_roll_joint",
    "right_shoulder_yaw_joint",
    "right_elbow_joint",
    "right_wrist_roll_joint",
    "right_wrist_pitch_joint",
    "right_wrist_yaw_joint",
];

pub const BODY_NAMES: [&str; 6] = [
    "pelvis",
    "torso_link",
    "left_knee_link",
    "right_knee_link",
    "left_ankle_roll_link",
    "right_ankle_roll_link",
];

/// Knee bodies, left then right.
pub const KNEE_BODIES: [&str; 2] = ["left_knee_link", "right_knee_link"];

/// Ankle-roll bodies, left then right. Foot contact is measured here.
pub const ANKLE_BODIES: [&str; 2] = ["left_ankle_roll_link", "right_ankle_roll_link"];

/// Foot-ground contact sensors, left then right.
pub const FOOT_CONTACT_SENSORS: [&str; 2] = ["left_foot_ground_contact", "right_foot_ground_contact"];

// ============================================================================
// Geometry
// ============================================================================

/// Hip joint to knee joint (m)
pub const THIGH_LENGTH: f32 = 0.30;

/// Knee joint to ankle joint (m)
pub const SHANK_LENGTH: f32 = 0.30;

/// Pelvis origin to hip joints, vertical (m)
pub const HIP_DROP: f32 = 0.08;

/// Pelvis origin to each hip joint, lateral (m)
pub const HIP_HALF_WIDTH: f32 = 0.10;

/// Ankle joint to sole (m)
pub const ANKLE_HEIGHT: f32 = 0.04;

/// Pelvis origin to torso link (m)
pub const TORSO_OFFSET: f32 = 0.20;

// ============================================================================
// Simulation
// ============================================================================

/// Physics timestep (s), 200 Hz
pub const PHYSICS_DT: f32 = 0.005;

/// Physics substeps per policy step, 50 Hz control
pub const DECIMATION: u32 = 4;

pub const EPISODE_LENGTH_S: f32 = 20.0;

// ============================================================================
// Pose and actuation
// ============================================================================

/// Default joint position for a joint name: slightly crouched legs with
/// relaxed arms.
pub fn default_joint_pos(name: &str) -> f32 {
    match name {
        n if n.ends_with("hip_pitch_joint") => -0.312,
        n if n.ends_with("knee_joint") => 0.669,
        n if n.ends_with("ankle_pitch_joint") => -0.363,
        n if n.ends_with("shoulder_pitch_joint") => 0.2,
        "left_shoulder_roll_joint" => 0.2,
        "right_shoulder_roll_joint" => -0.2,
        n if n.ends_with("elbow_joint") => 0.6,
        _ => 0.0,
    }
}

/// Per-joint action scale: `0.25 × effort limit / stiffness` of each
/// actuator class.
pub fn action_scale() -> OrderedMap<f32> {
    let mut scale = OrderedMap::new();
    scale.insert(".*_hip_pitch_joint|.*_hip_yaw_joint|waist_yaw_joint", 0.548);
    scale.insert(".*_hip_roll_joint|.*_knee_joint", 0.351);
    scale.insert(
        ".*_ankle_.*_joint|waist_roll_joint|waist_pitch_joint|.*_shoulder_.*_joint|.*_elbow_joint|.*_wrist_roll_joint",
        0.439,
    );
    scale.insert(".*_wrist_pitch_joint|.*_wrist_yaw_joint", 0.075);
    scale
}

/// Posture tolerance per joint class (rad). Legs and arms are looser than
/// the waist.
pub fn posture_std() -> OrderedMap<f32> {
    let mut std = OrderedMap::new();
    for (pattern, value) in [
        (".*_hip_pitch_joint", 0.4),
        (".*_hip_roll_joint", 0.2),
        (".*_hip_yaw_joint", 0.2),
        (".*_knee_joint", 0.5),
        (".*_ankle_pitch_joint", 0.3),
        (".*_ankle_roll_joint", 0.15),
        ("waist_yaw_joint", 0.15),
        ("waist_roll_joint", 0.1),
        ("waist_pitch_joint", 0.1),
        (".*_shoulder_pitch_joint", 0.4),
        (".*_shoulder_roll_joint", 0.2),
        (".*_shoulder_yaw_joint", 0.15),
        (".*_elbow_joint", 0.3),
        (".*_wrist_.*_joint", 0.4),
    ] {
        std.insert(pattern, value);
    }
    std
}
