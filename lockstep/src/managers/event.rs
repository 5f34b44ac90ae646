//! Event scheduling: startup, reset and interval modes.
//!
//! Interval events keep a countdown in seconds, either one per environment or
//! one for the whole batch (`is_global_time`). A countdown that elapses is
//! redrawn immediately. The firing itself can be suppressed per environment
//! by `min_step_count_between_reset`, which also rate-limits reset-mode
//! events.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::term::{ManagerTermCfg, ResolveTerm, TermRegistry};
use crate::context::EnvContext;
use crate::env_ids::EnvIds;
use crate::error::{ConfigError, EnvError, EvalError, ManagerKind};
use crate::ordered::TermCfgs;
use crate::rng::{random_uniform, SimRng};
use crate::scene::Simulation;

pub trait EventTerm<S: Simulation> {
    fn apply(&mut self, env: &mut EnvContext<S>, env_ids: &EnvIds) -> Result<(), EvalError>;

    fn reset(&mut self, _env_ids: &EnvIds) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventMode {
    Startup,
    Reset,
    Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTermCfg<F> {
    pub func: F,
    pub mode: EventMode,
    #[serde(default)]
    pub interval_range_s: Option<(f32, f32)>,
    #[serde(default)]
    pub is_global_time: bool,
    #[serde(default)]
    pub min_step_count_between_reset: u64,
}

impl<F> EventTermCfg<F> {
    pub fn startup(func: F) -> Self {
        Self::with_mode(func, EventMode::Startup)
    }

    pub fn reset(func: F) -> Self {
        Self::with_mode(func, EventMode::Reset)
    }

    /// Fire every `[min_s, max_s]` seconds, drawn uniformly.
    pub fn interval(func: F, min_s: f32, max_s: f32) -> Self {
        Self {
            interval_range_s: Some((min_s, max_s)),
            ..Self::with_mode(func, EventMode::Interval)
        }
    }

    fn with_mode(func: F, mode: EventMode) -> Self {
        Self {
            func,
            mode,
            interval_range_s: None,
            is_global_time: false,
            min_step_count_between_reset: 0,
        }
    }

    pub fn with_global_time(mut self) -> Self {
        self.is_global_time = true;
        self
    }

    pub fn with_min_step_count_between_reset(mut self, steps: u64) -> Self {
        self.min_step_count_between_reset = steps;
        self
    }
}

impl<S, F> ManagerTermCfg<S> for EventTermCfg<F>
where
    S: Simulation,
    F: ResolveTerm<S, Term = dyn EventTerm<S>>,
{
    type Term = dyn EventTerm<S>;

    fn validate(&self) -> Result<(), ConfigError> {
        match (self.mode, self.interval_range_s) {
            (EventMode::Interval, None) => Err(ConfigError::MissingParameter(
                "interval_range_s".into(),
            )),
            (EventMode::Interval, Some((lo, hi))) if !(0.0 <= lo && lo <= hi) => {
                Err(ConfigError::invalid(
                    "interval_range_s",
                    format!("({lo}, {hi}) is not a non-negative interval"),
                ))
            }
            (EventMode::Startup | EventMode::Reset, Some(_)) => Err(ConfigError::invalid(
                "interval_range_s",
                "only interval-mode events take an interval",
            )),
            _ => Ok(()),
        }
    }

    fn resolve(&self, env: &mut EnvContext<S>) -> Result<Box<Self::Term>, ConfigError> {
        self.func.resolve(env)
    }
}

// ============================================================================
// Scheduling state
// ============================================================================

const ELAPSED_EPS: f32 = 1e-6;

#[derive(Debug)]
struct IntervalTimer {
    range: (f32, f32),
    global: bool,
    /// Seconds left: one entry per environment, or a single entry when global.
    time_left: Array1<f32>,
}

impl IntervalTimer {
    fn new(range: (f32, f32), global: bool, num_envs: usize, rng: &mut SimRng) -> Self {
        let len = if global { 1 } else { num_envs };
        let time_left = Array1::from_shape_fn(len, |_| random_uniform(rng, range.0, range.1));
        Self {
            range,
            global,
            time_left,
        }
    }

    fn redraw(&mut self, slot: usize, rng: &mut SimRng) {
        self.time_left[slot] = random_uniform(rng, self.range.0, self.range.1);
    }
}

#[derive(Debug)]
struct EventSlot {
    mode: EventMode,
    min_steps: u64,
    timer: Option<IntervalTimer>,
    /// Step at which a reset-mode term last fired, per environment.
    last_triggered_step: Array1<u64>,
    triggered_once: Array1<bool>,
}

/// Dispatches event terms by mode.
pub struct EventManager<S: Simulation> {
    terms: TermRegistry<dyn EventTerm<S>>,
    slots: Vec<EventSlot>,
    /// Global step of each environment's last reset.
    last_reset_step: Array1<u64>,
    startup_applied: bool,
}

impl<S: Simulation> EventManager<S> {
    pub fn new<F>(cfgs: &TermCfgs<EventTermCfg<F>>, env: &mut EnvContext<S>) -> Result<Self, ConfigError>
    where
        F: ResolveTerm<S, Term = dyn EventTerm<S>>,
    {
        let num_envs = env.num_envs();
        let (terms, enabled) = TermRegistry::build(ManagerKind::Event, cfgs, env)?;
        let slots = enabled
            .iter()
            .map(|cfg| EventSlot {
                mode: cfg.mode,
                min_steps: cfg.min_step_count_between_reset,
                timer: cfg
                    .interval_range_s
                    .filter(|_| cfg.mode == EventMode::Interval)
                    .map(|range| IntervalTimer::new(range, cfg.is_global_time, num_envs, &mut env.rng)),
                last_triggered_step: Array1::zeros(num_envs),
                triggered_once: Array1::from_elem(num_envs, false),
            })
            .collect();
        Ok(Self {
            terms,
            slots,
            last_reset_step: Array1::zeros(num_envs),
            startup_applied: false,
        })
    }

    pub fn available_modes(&self) -> Vec<EventMode> {
        let mut modes = Vec::new();
        for slot in &self.slots {
            if !modes.contains(&slot.mode) {
                modes.push(slot.mode);
            }
        }
        modes
    }

    pub fn active_terms(&self, mode: EventMode) -> Vec<&str> {
        self.terms
            .names()
            .iter()
            .zip(self.slots.iter())
            .filter(|(_, slot)| slot.mode == mode)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Seconds until each interval term next fires.
    pub fn interval_time_left(&self, term: &str) -> Option<&Array1<f32>> {
        let idx = self.terms.position(term)?;
        self.slots[idx].timer.as_ref().map(|t| &t.time_left)
    }

    /// Fire startup terms for every environment. Runs at most once.
    pub fn apply_startup(&mut self, env: &mut EnvContext<S>) -> Result<(), EnvError> {
        if self.startup_applied {
            return Ok(());
        }
        self.startup_applied = true;
        let all = EnvIds::all(env.num_envs());
        for idx in 0..self.slots.len() {
            if self.slots[idx].mode == EventMode::Startup {
                self.terms.evaluate(idx, |term| term.apply(env, &all))?;
            }
        }
        Ok(())
    }

    /// Fire reset-mode terms for `env_ids`, honoring each term's step guard.
    pub fn apply_reset(&mut self, env: &mut EnvContext<S>, env_ids: &EnvIds) -> Result<(), EnvError> {
        let step = env.common_step_counter;
        for idx in 0..self.slots.len() {
            let slot = &mut self.slots[idx];
            if slot.mode != EventMode::Reset {
                continue;
            }
            let mut fire = EnvIds::none(env_ids.num_envs());
            for i in env_ids.iter() {
                let elapsed = step.saturating_sub(slot.last_triggered_step[i]);
                if slot.min_steps == 0 || !slot.triggered_once[i] || elapsed >= slot.min_steps {
                    fire.set(i);
                    slot.last_triggered_step[i] = step;
                    slot.triggered_once[i] = true;
                }
            }
            if fire.any() {
                self.terms.evaluate(idx, |term| term.apply(env, &fire))?;
            }
        }
        Ok(())
    }

    /// Advance interval countdowns by `dt` seconds and fire elapsed terms.
    pub fn apply_interval(&mut self, env: &mut EnvContext<S>, dt: f32) -> Result<(), EnvError> {
        let num_envs = env.num_envs();
        let step = env.common_step_counter;
        for idx in 0..self.slots.len() {
            let slot = &mut self.slots[idx];
            let Some(timer) = slot.timer.as_mut() else {
                continue;
            };
            timer.time_left -= dt;

            let elapsed = EnvIds::from_mask(&timer.time_left.mapv(|t| t < ELAPSED_EPS));
            if elapsed.is_empty() {
                continue;
            }
            for slot_idx in elapsed.iter() {
                timer.redraw(slot_idx, &mut env.rng);
            }
            let due = if timer.global {
                EnvIds::all(num_envs)
            } else {
                elapsed
            };

            let fire = if slot.min_steps > 0 {
                let min_steps = slot.min_steps;
                let settled = self
                    .last_reset_step
                    .mapv(|last| step.saturating_sub(last) >= min_steps);
                due.intersection(&EnvIds::from_mask(&settled))
            } else {
                due
            };
            if fire.any() {
                log::debug!(
                    "interval event '{}' fired for {} envs at step {step}",
                    self.terms.names()[idx],
                    fire.count()
                );
                self.terms.evaluate(idx, |term| term.apply(env, &fire))?;
            }
        }
        Ok(())
    }

    /// Record a reset for `env_ids` and redraw their per-environment countdowns.
    pub fn reset(&mut self, env_ids: &EnvIds, env: &mut EnvContext<S>) {
        let step = env.common_step_counter;
        for i in env_ids.iter() {
            self.last_reset_step[i] = step;
        }
        for slot in &mut self.slots {
            if let Some(timer) = slot.timer.as_mut().filter(|t| !t.global) {
                for i in env_ids.iter() {
                    timer.redraw(i, &mut env.rng);
                }
            }
        }
        for (_, term) in self.terms.iter_mut() {
            term.reset(env_ids);
        }
    }
}
