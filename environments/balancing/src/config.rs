//! Term vocabulary and presets for the balancing task.
//!
//! Each manager gets a closed enum of the functions a config may name, tagged
//! by `kind` in serialized form. Generic terms come from [`lockstep::mdp`],
//! task terms from [`crate::mdp`].
//!
//! # Example
//! ```ignore
//! let mut cfg = BalancingEnvCfg::flat(64).with_seed(7);
//! cfg.env.rewards.disable("static_stance");
//! let mut env = BalancingEnv::from_config(&cfg)?;
//! ```

use serde::{Deserialize, Serialize};

use lockstep::mdp::{self, ActionScale, AxisRanges, JointPositionActionCfg};
use lockstep::{
    ActionTerm, ActionTermCfg, ConfigError, EnvCfg, EnvContext, EventTerm, EventTermCfg,
    NoiseCfg, ObservationGroupCfg, ObservationTerm, ObservationTermCfg, OrderedMap, ResolveTerm,
    RewardTerm, RewardTermCfg, SceneEntityCfg, TermCfgs, TermSet, TerminationTerm,
    TerminationTermCfg,
};

use crate::mdp as task;
use crate::robot::{action_scale, posture_std, DECIMATION, EPISODE_LENGTH_S, ROBOT};
use crate::sim::{BipedSim, BipedSimCfg};

fn robot() -> SceneEntityCfg {
    SceneEntityCfg::new(ROBOT)
}

// ============================================================================
// Term vocabulary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalancingObs {
    BaseLinVel,
    BaseAngVel,
    ProjectedGravity,
    JointPosRel {
        #[serde(default = "robot")]
        asset: SceneEntityCfg,
    },
    JointVelRel {
        #[serde(default = "robot")]
        asset: SceneEntityCfg,
    },
    LastAction {
        #[serde(default)]
        term: Option<String>,
    },
    StandingLegIndicator,
    RaisedKneeHeight,
}

impl ResolveTerm<BipedSim> for BalancingObs {
    type Term = dyn ObservationTerm<BipedSim>;

    fn resolve(&self, env: &mut EnvContext<BipedSim>) -> Result<Box<Self::Term>, ConfigError> {
        let sim = &env.sim;
        Ok(match self {
            BalancingObs::BaseLinVel => Box::new(mdp::RootState::base_lin_vel(&robot(), sim)?),
            BalancingObs::BaseAngVel => Box::new(mdp::RootState::base_ang_vel(&robot(), sim)?),
            BalancingObs::ProjectedGravity => {
                Box::new(mdp::RootState::projected_gravity(&robot(), sim)?)
            }
            BalancingObs::JointPosRel { asset } => {
                Box::new(mdp::JointStateRel::joint_pos_rel(asset, sim)?)
            }
            BalancingObs::JointVelRel { asset } => {
                Box::new(mdp::JointStateRel::joint_vel_rel(asset, sim)?)
            }
            BalancingObs::LastAction { term } => Box::new(mdp::LastAction::new(term.clone())),
            BalancingObs::StandingLegIndicator => Box::new(task::StandingLegIndicator),
            BalancingObs::RaisedKneeHeight => Box::new(task::RaisedKneeHeight::new(sim)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalancingAction {
    JointPosition(JointPositionActionCfg),
}

impl ResolveTerm<BipedSim> for BalancingAction {
    type Term = dyn ActionTerm<BipedSim>;

    fn resolve(&self, env: &mut EnvContext<BipedSim>) -> Result<Box<Self::Term>, ConfigError> {
        match self {
            BalancingAction::JointPosition(cfg) => {
                Ok(Box::new(mdp::JointPositionAction::new(cfg, &env.sim)?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalancingEvent {
    ResetRootStateUniform {
        pose_range: AxisRanges,
        #[serde(default)]
        velocity_range: AxisRanges,
    },
    ResetJointsByScale {
        position_range: (f32, f32),
        velocity_range: (f32, f32),
        #[serde(default = "robot")]
        asset: SceneEntityCfg,
    },
    PushBySettingVelocity {
        velocity_range: AxisRanges,
    },
    RandomizeStandingLeg,
}

impl ResolveTerm<BipedSim> for BalancingEvent {
    type Term = dyn EventTerm<BipedSim>;

    fn resolve(&self, env: &mut EnvContext<BipedSim>) -> Result<Box<Self::Term>, ConfigError> {
        let sim = &env.sim;
        Ok(match self {
            BalancingEvent::ResetRootStateUniform {
                pose_range,
                velocity_range,
            } => Box::new(mdp::ResetRootStateUniform::new(
                &robot(),
                pose_range.clone(),
                velocity_range.clone(),
                sim,
            )?),
            BalancingEvent::ResetJointsByScale {
                position_range,
                velocity_range,
                asset,
            } => Box::new(mdp::ResetJointsByScale::new(
                asset,
                *position_range,
                *velocity_range,
                sim,
            )?),
            BalancingEvent::PushBySettingVelocity { velocity_range } => Box::new(
                mdp::PushBySettingVelocity::new(&robot(), velocity_range.clone(), sim)?,
            ),
            BalancingEvent::RandomizeStandingLeg => Box::new(task::RandomizeStandingLeg),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalancingReward {
    AliveBonus,
    KneeHeightAboveThreshold {
        threshold: f32,
        std: f32,
    },
    UprightPosture,
    BaseStability,
    JointPosture {
        std: OrderedMap<f32>,
        #[serde(default = "robot")]
        asset: SceneEntityCfg,
    },
    RaisedFootHeightOptimalRange {
        min_height: f32,
        optimal_height: f32,
        max_height: f32,
    },
    FootClearance,
    StaticStancePenalty,
    ActionRateL2,
    ActionL2,
    JointVelL2 {
        #[serde(default = "robot")]
        asset: SceneEntityCfg,
    },
    AngVelXyL2,
    FlatOrientationL2,
}

impl ResolveTerm<BipedSim> for BalancingReward {
    type Term = dyn RewardTerm<BipedSim>;

    fn resolve(&self, env: &mut EnvContext<BipedSim>) -> Result<Box<Self::Term>, ConfigError> {
        let sim = &env.sim;
        Ok(match self {
            BalancingReward::AliveBonus => Box::new(mdp::IsAlive),
            BalancingReward::KneeHeightAboveThreshold { threshold, std } => {
                Box::new(task::KneeHeightAboveThreshold::new(*threshold, *std, sim)?)
            }
            BalancingReward::UprightPosture => Box::new(task::UprightPosture),
            BalancingReward::BaseStability => Box::new(task::BaseStability),
            BalancingReward::JointPosture { std, asset } => {
                Box::new(task::JointPosture::new(asset, std, sim)?)
            }
            BalancingReward::RaisedFootHeightOptimalRange {
                min_height,
                optimal_height,
                max_height,
            } => Box::new(task::RaisedFootHeightOptimalRange::new(
                *min_height,
                *optimal_height,
                *max_height,
                sim,
            )?),
            BalancingReward::FootClearance => Box::new(task::FootClearance),
            BalancingReward::StaticStancePenalty => Box::new(task::StaticStancePenalty),
            BalancingReward::ActionRateL2 => Box::new(mdp::ActionRateL2),
            BalancingReward::ActionL2 => Box::new(mdp::ActionL2),
            BalancingReward::JointVelL2 { asset } => Box::new(mdp::JointVelL2::new(asset, sim)?),
            BalancingReward::AngVelXyL2 => Box::new(mdp::AngVelXyL2::new(&robot(), sim)?),
            BalancingReward::FlatOrientationL2 => {
                Box::new(mdp::FlatOrientationL2::new(&robot(), sim)?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalancingDone {
    TimeOut,
    /// Tilt limit in radians.
    BadOrientation {
        limit_angle: f32,
    },
    RootHeightBelowMinimum {
        minimum_height: f32,
    },
    RaisedFootContact,
}

impl ResolveTerm<BipedSim> for BalancingDone {
    type Term = dyn TerminationTerm<BipedSim>;

    fn resolve(&self, env: &mut EnvContext<BipedSim>) -> Result<Box<Self::Term>, ConfigError> {
        let sim = &env.sim;
        Ok(match self {
            BalancingDone::TimeOut => Box::new(mdp::TimeOut),
            BalancingDone::BadOrientation { limit_angle } => {
                Box::new(mdp::BadOrientation::new(&robot(), *limit_angle, sim)?)
            }
            BalancingDone::RootHeightBelowMinimum { minimum_height } => Box::new(
                mdp::RootHeightBelowMinimum::new(&robot(), *minimum_height, sim)?,
            ),
            BalancingDone::RaisedFootContact => Box::new(task::RaisedFootContact),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BalancingTerms;

impl TermSet for BalancingTerms {
    type Sim = BipedSim;
    type Observation = BalancingObs;
    type Action = BalancingAction;
    type Event = BalancingEvent;
    type Reward = BalancingReward;
    type Termination = BalancingDone;
}

// ============================================================================
// Environment configuration
// ============================================================================

/// Batch size, simulation parameters and the manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancingEnvCfg {
    pub num_envs: usize,
    #[serde(default)]
    pub sim: BipedSimCfg,
    #[serde(flatten)]
    pub env: EnvCfg<BalancingTerms>,
}

impl BalancingEnvCfg {
    /// Training setup: noisy policy observations, clean critic
    /// observations, reset randomization and periodic pushes.
    pub fn flat(num_envs: usize) -> Self {
        let env = EnvCfg {
            decimation: DECIMATION,
            episode_length_s: EPISODE_LENGTH_S,
            seed: 0,
            observations: TermCfgs::new()
                .with_term("policy", proprioception().with_corruption(true))
                .with_term("critic", proprioception().with_corruption(false)),
            actions: TermCfgs::new().with_term(
                "joint_pos",
                ActionTermCfg::new(BalancingAction::JointPosition(
                    JointPositionActionCfg::new(ROBOT, [".*"])
                        .with_scale(ActionScale::PerJoint(action_scale())),
                )),
            ),
            events: TermCfgs::new()
                .with_term(
                    "reset_base",
                    EventTermCfg::reset(BalancingEvent::ResetRootStateUniform {
                        pose_range: AxisRanges::default().with_yaw(-0.2, 0.2),
                        velocity_range: AxisRanges::default(),
                    }),
                )
                .with_term(
                    "reset_robot_joints",
                    EventTermCfg::reset(BalancingEvent::ResetJointsByScale {
                        position_range: (1.0, 1.0),
                        velocity_range: (0.0, 0.0),
                        asset: robot().with_joints([".*"]),
                    }),
                )
                .with_term(
                    "randomize_standing_leg",
                    EventTermCfg::reset(BalancingEvent::RandomizeStandingLeg),
                )
                .with_term(
                    "push_robot",
                    EventTermCfg::interval(
                        BalancingEvent::PushBySettingVelocity {
                            velocity_range: AxisRanges::default()
                                .with_x(-0.2, 0.2)
                                .with_y(-0.2, 0.2)
                                .with_yaw(-0.1, 0.1),
                        },
                        8.0,
                        12.0,
                    ),
                ),
            rewards: TermCfgs::new()
                .with_term("upright", RewardTermCfg::new(BalancingReward::UprightPosture, 3.0))
                .with_term(
                    "foot_height",
                    RewardTermCfg::new(
                        BalancingReward::RaisedFootHeightOptimalRange {
                            min_height: 0.10,
                            optimal_height: 0.25,
                            max_height: 0.40,
                        },
                        3.5,
                    ),
                )
                .with_term("foot_clearance", RewardTermCfg::new(BalancingReward::FootClearance, 1.5))
                .with_term(
                    "static_stance",
                    RewardTermCfg::new(BalancingReward::StaticStancePenalty, -0.5),
                )
                .with_term("action_rate_l2", RewardTermCfg::new(BalancingReward::ActionRateL2, -0.01))
                .with_term(
                    "joint_posture",
                    RewardTermCfg::new(
                        BalancingReward::JointPosture {
                            std: posture_std(),
                            asset: robot().with_joints([".*"]),
                        },
                        0.5,
                    ),
                ),
            terminations: TermCfgs::new()
                .with_term("time_out", TerminationTermCfg::time_out(BalancingDone::TimeOut))
                .with_term(
                    "fell_over",
                    TerminationTermCfg::new(BalancingDone::BadOrientation {
                        limit_angle: 70f32.to_radians(),
                    }),
                ),
        };
        Self {
            num_envs,
            sim: BipedSimCfg::default(),
            env,
        }
    }

    /// Evaluation setup: clean policy observations, no pushes and
    /// episodes that never time out in practice.
    pub fn play(num_envs: usize) -> Self {
        let mut cfg = Self::flat(num_envs);
        if let Some(policy) = cfg.env.observations.term_mut("policy") {
            policy.enable_corruption = false;
        }
        cfg.env.events.disable("push_robot");
        cfg.env.episode_length_s = 1.0e9;
        cfg
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.env.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_envs == 0 {
            return Err(ConfigError::invalid("num_envs", "must be at least 1"));
        }
        self.sim.validate()?;
        self.env.validate()
    }
}

/// Base motion, joint state, last action and standing leg. Shared by the
/// policy and critic groups; only the policy group applies noise.
fn proprioception() -> ObservationGroupCfg<BalancingObs> {
    let term = ObservationTermCfg::new;
    ObservationGroupCfg::new(
        TermCfgs::new()
            .with_term(
                "base_ang_vel",
                term(BalancingObs::BaseAngVel).with_noise(NoiseCfg::uniform(-0.2, 0.2)),
            )
            .with_term(
                "projected_gravity",
                term(BalancingObs::ProjectedGravity).with_noise(NoiseCfg::uniform(-0.05, 0.05)),
            )
            .with_term(
                "joint_pos",
                term(BalancingObs::JointPosRel { asset: robot() })
                    .with_noise(NoiseCfg::uniform(-0.01, 0.01)),
            )
            .with_term(
                "joint_vel",
                term(BalancingObs::JointVelRel { asset: robot() })
                    .with_noise(NoiseCfg::uniform(-1.5, 1.5)),
            )
            .with_term("actions", term(BalancingObs::LastAction { term: None }))
            .with_term("standing_leg", term(BalancingObs::StandingLegIndicator)),
    )
}
