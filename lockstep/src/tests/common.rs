//! Deterministic test simulation and term set.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::context::EnvContext;
use crate::env::{EnvCfg, ManagerBasedRlEnv, TermSet};
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EvalError};
use crate::extras::{ScratchKey, ScratchReset};
use crate::managers::{
    ActionTerm, ActionTermCfg, EventTerm, EventTermCfg, ObservationGroupCfg, ObservationTerm,
    ObservationTermCfg, ResolveTerm, RewardTerm, RewardTermCfg, TerminationTerm,
    TerminationTermCfg,
};
use crate::mdp::{self, AxisRanges, JointPositionActionCfg};
use crate::ordered::TermCfgs;
use crate::scene::{Entity, SceneEntityCfg, Simulation};

/// Exact in binary so countdown arithmetic has no rounding drift.
pub const PHYSICS_DT: f32 = 0.125;
pub const DECIMATION: u32 = 2;
pub const STEP_DT: f32 = PHYSICS_DT * DECIMATION as f32;

// ============================================================================
// TestSim
// ============================================================================

/// One "robot" entity whose joints snap to their position targets.
pub struct TestSim {
    num_envs: usize,
    robot: Entity,
    pub substeps: usize,
}

impl TestSim {
    pub fn new(num_envs: usize) -> Self {
        let joints = ["hip_joint", "knee_joint", "ankle_joint"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let bodies = ["base", "foot"].iter().map(|s| s.to_string()).collect();
        let mut robot = Entity::new("robot", joints, bodies, num_envs);
        for mut row in robot.data.default_joint_pos.rows_mut() {
            row.assign(&ndarray::array![0.1, 0.2, 0.3]);
        }
        robot.data.default_root_state.column_mut(2).fill(1.0);
        robot.data.joint_pos = robot.data.default_joint_pos.clone();
        robot.data.joint_pos_target = robot.data.default_joint_pos.clone();
        robot.data.root_link_pos_w.column_mut(2).fill(1.0);
        robot
            .data
            .sensor_data
            .insert("contact".into(), Array2::zeros((num_envs, 1)));
        Self {
            num_envs,
            robot,
            substeps: 0,
        }
    }

    pub fn robot(&self) -> &Entity {
        &self.robot
    }
}

impl Simulation for TestSim {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn physics_dt(&self) -> f32 {
        PHYSICS_DT
    }

    fn entity(&self, name: &str) -> Option<&Entity> {
        (name == "robot").then_some(&self.robot)
    }

    fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        (name == "robot").then_some(&mut self.robot)
    }

    fn step(&mut self) -> Result<(), EvalError> {
        self.substeps += 1;
        let data = &mut self.robot.data;
        data.joint_vel = (&data.joint_pos_target - &data.joint_pos) / PHYSICS_DT;
        data.joint_pos.assign(&data.joint_pos_target);
        data.update_derived();
        Ok(())
    }

    fn forward(&mut self) -> Result<(), EvalError> {
        self.robot.data.update_derived();
        Ok(())
    }

    fn reset(&mut self, env_ids: &EnvIds) {
        let data = &mut self.robot.data;
        for i in env_ids.iter() {
            let default_pos = data.default_joint_pos.row(i).to_owned();
            data.joint_pos.row_mut(i).assign(&default_pos);
            data.joint_pos_target.row_mut(i).assign(&default_pos);
            data.joint_vel.row_mut(i).fill(0.0);
            let root = data.default_root_state.row(i).to_owned();
            data.root_link_pos_w.row_mut(i).assign(&root.slice(ndarray::s![0..3]));
            data.root_link_quat_w.row_mut(i).assign(&root.slice(ndarray::s![3..7]));
            data.root_link_lin_vel_w.row_mut(i).fill(0.0);
            data.root_link_ang_vel_w.row_mut(i).fill(0.0);
        }
    }
}

// ============================================================================
// Test terms
// ============================================================================

struct ConstantObs {
    value: f32,
    dim: usize,
}

impl ObservationTerm<TestSim> for ConstantObs {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array2<f32>, EvalError> {
        Ok(Array2::from_elem((env.num_envs(), self.dim), self.value))
    }
}

/// Global step counter, identical for every environment.
struct StepCounterObs;

impl ObservationTerm<TestSim> for StepCounterObs {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array2<f32>, EvalError> {
        Ok(Array2::from_elem(
            (env.num_envs(), 1),
            env.common_step_counter as f32,
        ))
    }
}

/// `env_index * 1000 + global step`.
struct TaggedCounterObs;

impl ObservationTerm<TestSim> for TaggedCounterObs {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array2<f32>, EvalError> {
        let step = env.common_step_counter as f32;
        Ok(Array2::from_shape_fn((env.num_envs(), 1), |(i, _)| {
            i as f32 * 1000.0 + step
        }))
    }
}

struct FailAfterObs {
    steps: u64,
}

impl ObservationTerm<TestSim> for FailAfterObs {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array2<f32>, EvalError> {
        if env.common_step_counter >= self.steps {
            return Err(EvalError::UnknownSensor {
                entity: "robot".into(),
                sensor: "lidar".into(),
            });
        }
        Ok(Array2::zeros((env.num_envs(), 1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestObs {
    Constant { value: f32, dim: usize },
    StepCounter,
    TaggedCounter,
    FailAfter { steps: u64 },
    JointPosRel { asset: SceneEntityCfg },
    LastAction,
}

impl ResolveTerm<TestSim> for TestObs {
    type Term = dyn ObservationTerm<TestSim>;

    fn resolve(&self, env: &mut EnvContext<TestSim>) -> Result<Box<Self::Term>, ConfigError> {
        Ok(match self {
            TestObs::Constant { value, dim } => Box::new(ConstantObs {
                value: *value,
                dim: *dim,
            }),
            TestObs::StepCounter => Box::new(StepCounterObs),
            TestObs::TaggedCounter => Box::new(TaggedCounterObs),
            TestObs::FailAfter { steps } => Box::new(FailAfterObs { steps: *steps }),
            TestObs::JointPosRel { asset } => {
                Box::new(mdp::JointStateRel::joint_pos_rel(asset, &env.sim)?)
            }
            TestObs::LastAction => Box::new(mdp::LastAction::new(None)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestAction {
    JointPosition(JointPositionActionCfg),
}

impl ResolveTerm<TestSim> for TestAction {
    type Term = dyn ActionTerm<TestSim>;

    fn resolve(&self, env: &mut EnvContext<TestSim>) -> Result<Box<Self::Term>, ConfigError> {
        match self {
            TestAction::JointPosition(cfg) => {
                Ok(Box::new(mdp::JointPositionAction::new(cfg, &env.sim)?))
            }
        }
    }
}

/// Counts firings per environment in scratch entry `key`, and records the
/// global step of the latest firing in `<key>_step`.
struct CountEvent {
    count: ScratchKey<f32>,
    last_step: ScratchKey<i64>,
}

impl EventTerm<TestSim> for CountEvent {
    fn apply(&mut self, env: &mut EnvContext<TestSim>, env_ids: &EnvIds) -> Result<(), EvalError> {
        let step = env.common_step_counter as i64;
        let counts = env.extras.get_or_insert(&self.count)?;
        for i in env_ids.iter() {
            counts[i] += 1.0;
        }
        let steps = env.extras.get_or_insert(&self.last_step)?;
        for i in env_ids.iter() {
            steps[i] = step;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestEvent {
    Count { key: String },
    ResetRoot { pose_range: AxisRanges },
    Push { velocity_range: AxisRanges },
}

impl ResolveTerm<TestSim> for TestEvent {
    type Term = dyn EventTerm<TestSim>;

    fn resolve(&self, env: &mut EnvContext<TestSim>) -> Result<Box<Self::Term>, ConfigError> {
        let robot = SceneEntityCfg::new("robot");
        Ok(match self {
            TestEvent::Count { key } => Box::new(CountEvent {
                count: ScratchKey::named(key.clone(), ScratchReset::Owner),
                last_step: ScratchKey::named(format!("{key}_step"), ScratchReset::Owner),
            }),
            TestEvent::ResetRoot { pose_range } => Box::new(mdp::ResetRootStateUniform::new(
                &robot,
                pose_range.clone(),
                AxisRanges::default(),
                &env.sim,
            )?),
            TestEvent::Push { velocity_range } => Box::new(mdp::PushBySettingVelocity::new(
                &robot,
                velocity_range.clone(),
                &env.sim,
            )?),
        })
    }
}

struct ConstantReward(f32);

impl RewardTerm<TestSim> for ConstantReward {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array1<f32>, EvalError> {
        Ok(Array1::from_elem(env.num_envs(), self.0))
    }
}

/// `(i + 1) * scale` for environment `i`.
struct IndexedReward(f32);

impl RewardTerm<TestSim> for IndexedReward {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array1<f32>, EvalError> {
        Ok(Array1::from_shape_fn(env.num_envs(), |i| (i as f32 + 1.0) * self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestReward {
    Constant { value: f32 },
    Indexed { scale: f32 },
    Alive,
    ActionRate,
}

impl ResolveTerm<TestSim> for TestReward {
    type Term = dyn RewardTerm<TestSim>;

    fn resolve(&self, _env: &mut EnvContext<TestSim>) -> Result<Box<Self::Term>, ConfigError> {
        Ok(match self {
            TestReward::Constant { value } => Box::new(ConstantReward(*value)),
            TestReward::Indexed { scale } => Box::new(IndexedReward(*scale)),
            TestReward::Alive => Box::new(mdp::IsAlive),
            TestReward::ActionRate => Box::new(mdp::ActionRateL2),
        })
    }
}

/// True for a fixed set of environments.
struct EnvsDone(Vec<usize>);

impl TerminationTerm<TestSim> for EnvsDone {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array1<bool>, EvalError> {
        Ok(Array1::from_shape_fn(env.num_envs(), |i| self.0.contains(&i)))
    }
}

/// True once an environment's episode reaches `steps`.
struct AfterSteps(u32);

impl TerminationTerm<TestSim> for AfterSteps {
    fn compute(&mut self, env: &EnvContext<TestSim>) -> Result<Array1<bool>, EvalError> {
        Ok(env.episode_length_buf.mapv(|n| n >= self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestDone {
    Envs { ids: Vec<usize> },
    AfterSteps { steps: u32 },
    TimeOut,
}

impl ResolveTerm<TestSim> for TestDone {
    type Term = dyn TerminationTerm<TestSim>;

    fn resolve(&self, _env: &mut EnvContext<TestSim>) -> Result<Box<Self::Term>, ConfigError> {
        Ok(match self {
            TestDone::Envs { ids } => Box::new(EnvsDone(ids.clone())),
            TestDone::AfterSteps { steps } => Box::new(AfterSteps(*steps)),
            TestDone::TimeOut => Box::new(mdp::TimeOut),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TestTerms;

impl TermSet for TestTerms {
    type Sim = TestSim;
    type Observation = TestObs;
    type Action = TestAction;
    type Event = TestEvent;
    type Reward = TestReward;
    type Termination = TestDone;
}

pub type TestCfg = EnvCfg<TestTerms>;
pub type TestEnv = ManagerBasedRlEnv<TestSim>;

// ============================================================================
// Builders
// ============================================================================

pub fn obs(func: TestObs) -> ObservationTermCfg<TestObs> {
    ObservationTermCfg::new(func)
}

pub fn constant(value: f32, dim: usize) -> ObservationTermCfg<TestObs> {
    obs(TestObs::Constant { value, dim })
}

pub fn group(terms: Vec<(&str, ObservationTermCfg<TestObs>)>) -> ObservationGroupCfg<TestObs> {
    let mut cfgs = TermCfgs::new();
    for (name, cfg) in terms {
        cfgs.insert(name, Some(cfg));
    }
    ObservationGroupCfg::new(cfgs)
}

pub fn count_event(key: &str) -> TestEvent {
    TestEvent::Count { key: key.into() }
}

/// Policy group with one constant term, a joint position action over all
/// three joints, and a 100 s episode.
pub fn base_cfg() -> TestCfg {
    EnvCfg {
        decimation: DECIMATION,
        episode_length_s: 100.0,
        seed: 42,
        observations: TermCfgs::new().with_term("policy", group(vec![("bias", constant(1.0, 1))])),
        actions: TermCfgs::new().with_term(
            "joint_pos",
            ActionTermCfg::new(TestAction::JointPosition(JointPositionActionCfg::new(
                "robot",
                [".*"],
            ))),
        ),
        events: TermCfgs::new(),
        rewards: TermCfgs::new(),
        terminations: TermCfgs::new(),
    }
}

pub fn with_group(mut cfg: TestCfg, name: &str, group: ObservationGroupCfg<TestObs>) -> TestCfg {
    cfg.observations = TermCfgs::new().with_term(name, group);
    cfg
}

pub fn with_event(mut cfg: TestCfg, name: &str, event: EventTermCfg<TestEvent>) -> TestCfg {
    cfg.events.insert(name, Some(event));
    cfg
}

pub fn with_reward(mut cfg: TestCfg, name: &str, func: TestReward, weight: f32) -> TestCfg {
    cfg.rewards.insert(name, Some(RewardTermCfg::new(func, weight)));
    cfg
}

pub fn with_done(mut cfg: TestCfg, name: &str, func: TestDone, time_out: bool) -> TestCfg {
    let term = if time_out {
        TerminationTermCfg::time_out(func)
    } else {
        TerminationTermCfg::new(func)
    };
    cfg.terminations.insert(name, Some(term));
    cfg
}

pub fn make_env(cfg: &TestCfg, num_envs: usize) -> TestEnv {
    ManagerBasedRlEnv::new(cfg, TestSim::new(num_envs)).expect("test env builds")
}

pub fn zero_actions(env: &TestEnv) -> Array2<f32> {
    Array2::zeros((env.num_envs(), env.action_manager().total_action_dim()))
}

/// Scratch counter `key` as a plain vector (zeros if never written).
pub fn counts(env: &TestEnv, key: &str) -> Vec<f32> {
    let k: ScratchKey<f32> = ScratchKey::named(key, ScratchReset::Owner);
    env.context().extras.read(&k).expect("f32 entry").to_vec()
}

/// Global step of the latest firing recorded by a count event.
pub fn last_fired(env: &TestEnv, key: &str) -> Vec<i64> {
    let k: ScratchKey<i64> = ScratchKey::named(format!("{key}_step"), ScratchReset::Owner);
    env.context().extras.read(&k).expect("i64 entry").to_vec()
}

/// Concatenated tensor of `group` as a 2-D array.
pub fn group_matrix(obs: &crate::managers::Observations, group: &str) -> Array2<f32> {
    obs.get(group)
        .and_then(|g| g.as_tensor())
        .expect("concatenated group")
        .clone()
        .into_dimensionality::<ndarray::Ix2>()
        .expect("rank-2 group")
}

/// The error a configuration fails construction with.
pub fn build_err(cfg: &TestCfg, num_envs: usize) -> crate::EnvError {
    match ManagerBasedRlEnv::new(cfg, TestSim::new(num_envs)) {
        Ok(_) => panic!("construction should fail"),
        Err(err) => err,
    }
}
