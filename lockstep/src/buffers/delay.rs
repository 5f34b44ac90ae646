//! Per-environment stochastic observation delay.

use ndarray::{Array1, Array2, ArrayView2, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::CircularBuffer;
use crate::env_ids::EnvIds;
use crate::error::ConfigError;
use crate::rng::{random_int_inclusive, SimRng};

/// Delay model parameters, in environment steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayCfg {
    pub min_lag: usize,
    pub max_lag: usize,
    /// Independent lag per environment; otherwise one lag for the batch.
    pub per_env: bool,
    /// Probability of keeping the previous lag at a resample point.
    pub hold_prob: f32,
    /// Steps between resamples. `0` resamples every step.
    pub update_period: usize,
    /// Stagger resample points with a random per-environment phase.
    pub per_env_phase: bool,
}

impl Default for DelayCfg {
    fn default() -> Self {
        Self {
            min_lag: 0,
            max_lag: 0,
            per_env: true,
            hold_prob: 0.0,
            update_period: 0,
            per_env_phase: true,
        }
    }
}

impl DelayCfg {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_lag > self.max_lag {
            return Err(ConfigError::invalid(
                "delay_min_lag",
                format!("{} exceeds delay_max_lag {}", self.min_lag, self.max_lag),
            ));
        }
        if !(0.0..=1.0).contains(&self.hold_prob) {
            return Err(ConfigError::invalid(
                "delay_hold_prob",
                format!("{} is not a probability", self.hold_prob),
            ));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.max_lag > 0
    }
}

/// Ring of the last `max_lag + 1` raw samples with a lag drawn per
/// environment.
#[derive(Debug, Clone)]
pub struct DelayBuffer {
    cfg: DelayCfg,
    buffer: CircularBuffer,
    lags: Array1<usize>,
    phase_offsets: Array1<usize>,
    pending_resample: Array1<bool>,
    step_count: u64,
}

impl DelayBuffer {
    pub fn new(
        cfg: DelayCfg,
        num_envs: usize,
        feature_dim: usize,
        rng: &mut SimRng,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let buffer = CircularBuffer::new(cfg.max_lag + 1, num_envs, feature_dim)?;
        let phase_offsets = if cfg.update_period > 0 && cfg.per_env_phase && cfg.per_env {
            Array1::from_shape_fn(num_envs, |_| rng.gen_range(0..cfg.update_period))
        } else {
            Array1::zeros(num_envs)
        };
        Ok(Self {
            lags: Array1::from_elem(num_envs, cfg.min_lag),
            pending_resample: Array1::from_elem(num_envs, true),
            phase_offsets,
            buffer,
            step_count: 0,
            cfg,
        })
    }

    pub fn lags(&self) -> &Array1<usize> {
        &self.lags
    }

    /// Push this step's raw sample and return the delayed one.
    pub fn compute(&mut self, raw: ArrayView2<f32>, rng: &mut SimRng) -> Array2<f32> {
        self.buffer.append(raw);
        self.update_lags(rng);
        self.step_count += 1;
        self.buffer.get(&self.lags)
    }

    /// Clear history for `env_ids`. With per-environment lags they draw a
    /// fresh lag on their next push; a shared lag keeps its schedule.
    pub fn reset(&mut self, env_ids: &EnvIds) {
        self.buffer.reset(env_ids);
        if self.cfg.per_env {
            for i in env_ids.iter() {
                self.pending_resample[i] = true;
            }
        }
    }

    fn due_mask(&self) -> Array1<bool> {
        let period = self.cfg.update_period as u64;
        if period == 0 {
            return Array1::from_elem(self.lags.len(), true);
        }
        let step = self.step_count;
        self.phase_offsets.mapv(|phase| (step + phase as u64) % period == 0)
    }

    fn update_lags(&mut self, rng: &mut SimRng) {
        if self.cfg.min_lag == self.cfg.max_lag {
            self.lags.fill(self.cfg.min_lag);
        } else if self.cfg.per_env {
            self.update_per_env_lags(rng);
        } else {
            self.update_shared_lag(rng);
        }
        self.pending_resample.fill(false);
    }

    /// Every push draws a full candidate vector (and hold coins when holding
    /// is enabled), so stream consumption never depends on which
    /// environments were reset.
    fn update_per_env_lags(&mut self, rng: &mut SimRng) {
        let (min, max) = (self.cfg.min_lag, self.cfg.max_lag);
        let n = self.lags.len();
        let hold_prob = self.cfg.hold_prob;
        let candidates = Array1::from_shape_fn(n, |_| random_int_inclusive(rng, min, max));
        let coins: Array1<f32> = if hold_prob > 0.0 {
            Array1::from_shape_fn(n, |_| rng.gen())
        } else {
            Array1::ones(n)
        };
        let due = self.due_mask();

        let mut resampled = 0usize;
        Zip::from(&mut self.lags)
            .and(&candidates)
            .and(&coins)
            .and(&due)
            .and(&self.pending_resample)
            .for_each(|lag, &candidate, &coin, &is_due, &forced| {
                if forced || (is_due && coin >= hold_prob) {
                    *lag = candidate;
                    resampled += 1;
                }
            });
        log::trace!("delay lags resampled for {resampled} envs");
    }

    fn update_shared_lag(&mut self, rng: &mut SimRng) {
        let first = self.step_count == 0;
        let period = self.cfg.update_period as u64;
        if !first && period > 0 && self.step_count % period != 0 {
            return;
        }
        let hold = !first && self.cfg.hold_prob > 0.0 && rng.gen::<f32>() < self.cfg.hold_prob;
        if !hold {
            let lag = random_int_inclusive(rng, self.cfg.min_lag, self.cfg.max_lag);
            self.lags.fill(lag);
            log::trace!("shared delay lag resampled to {lag}");
        }
    }
}
