//! Observation corruption.
//!
//! A [`NoiseCfg`] is a stateless per-element perturbation. A
//! [`NoiseModelCfg`] adds a per-environment bias that is drawn when an
//! environment resets and then held for the whole episode.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::env_ids::EnvIds;
use crate::error::ConfigError;
use crate::rng::{random_gaussian, random_uniform, SimRng};

/// How a noise sample combines with the clean value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseOperation {
    #[default]
    Add,
    Scale,
    /// Replace the value with the sample.
    Abs,
}

impl NoiseOperation {
    #[inline]
    fn combine(self, value: f32, sample: f32) -> f32 {
        match self {
            NoiseOperation::Add => value + sample,
            NoiseOperation::Scale => value * sample,
            NoiseOperation::Abs => sample,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoiseCfg {
    Constant {
        bias: f32,
        #[serde(default)]
        operation: NoiseOperation,
    },
    Uniform {
        n_min: f32,
        n_max: f32,
        #[serde(default)]
        operation: NoiseOperation,
    },
    Gaussian {
        #[serde(default)]
        mean: f32,
        std: f32,
        #[serde(default)]
        operation: NoiseOperation,
    },
}

impl NoiseCfg {
    /// Additive uniform noise in `[n_min, n_max)`.
    pub fn uniform(n_min: f32, n_max: f32) -> Self {
        NoiseCfg::Uniform {
            n_min,
            n_max,
            operation: NoiseOperation::Add,
        }
    }

    /// Additive Gaussian noise.
    pub fn gaussian(mean: f32, std: f32) -> Self {
        NoiseCfg::Gaussian {
            mean,
            std,
            operation: NoiseOperation::Add,
        }
    }

    pub fn constant(bias: f32) -> Self {
        NoiseCfg::Constant {
            bias,
            operation: NoiseOperation::Add,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            NoiseCfg::Uniform { n_min, n_max, .. } if n_min > n_max => Err(ConfigError::invalid(
                "noise",
                format!("uniform n_min {n_min} exceeds n_max {n_max}"),
            )),
            NoiseCfg::Gaussian { std, .. } if std < 0.0 => Err(ConfigError::invalid(
                "noise",
                format!("gaussian std {std} is negative"),
            )),
            _ => Ok(()),
        }
    }

    fn operation(&self) -> NoiseOperation {
        match *self {
            NoiseCfg::Constant { operation, .. }
            | NoiseCfg::Uniform { operation, .. }
            | NoiseCfg::Gaussian { operation, .. } => operation,
        }
    }

    #[inline]
    fn sample(&self, rng: &mut SimRng) -> f32 {
        match *self {
            NoiseCfg::Constant { bias, .. } => bias,
            NoiseCfg::Uniform { n_min, n_max, .. } => random_uniform(rng, n_min, n_max),
            NoiseCfg::Gaussian { mean, std, .. } => random_gaussian(rng, mean, std),
        }
    }

    /// Perturb every element in row-major order.
    pub fn apply(&self, data: &mut Array2<f32>, rng: &mut SimRng) {
        let op = self.operation();
        for v in data.iter_mut() {
            *v = op.combine(*v, self.sample(rng));
        }
    }
}

/// Noise with an optional per-episode additive bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseModelCfg {
    pub noise: NoiseCfg,
    #[serde(default)]
    pub bias: Option<NoiseCfg>,
}

/// What an observation term accepts for `noise`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationNoise {
    Model(NoiseModelCfg),
    Plain(NoiseCfg),
}

impl From<NoiseCfg> for ObservationNoise {
    fn from(cfg: NoiseCfg) -> Self {
        ObservationNoise::Plain(cfg)
    }
}

impl From<NoiseModelCfg> for ObservationNoise {
    fn from(cfg: NoiseModelCfg) -> Self {
        ObservationNoise::Model(cfg)
    }
}

impl ObservationNoise {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ObservationNoise::Plain(cfg) => cfg.validate(),
            ObservationNoise::Model(model) => {
                model.noise.validate()?;
                model.bias.as_ref().map_or(Ok(()), NoiseCfg::validate)
            }
        }
    }
}

/// Runtime state of one term's noise.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    noise: NoiseCfg,
    bias_cfg: Option<NoiseCfg>,
    bias: Option<Array2<f32>>,
}

impl NoiseModel {
    pub fn new(cfg: &ObservationNoise, num_envs: usize, feature_dim: usize) -> Self {
        let (noise, bias_cfg) = match cfg {
            ObservationNoise::Plain(noise) => (noise.clone(), None),
            ObservationNoise::Model(model) => (model.noise.clone(), model.bias.clone()),
        };
        let bias = bias_cfg
            .as_ref()
            .map(|_| Array2::zeros((num_envs, feature_dim)));
        Self {
            noise,
            bias_cfg,
            bias,
        }
    }

    pub fn bias(&self) -> Option<&Array2<f32>> {
        self.bias.as_ref()
    }

    /// Draw a fresh bias for the reset environments only.
    pub fn reset(&mut self, env_ids: &EnvIds, rng: &mut SimRng) {
        let (Some(cfg), Some(bias)) = (&self.bias_cfg, &mut self.bias) else {
            return;
        };
        let op = cfg.operation();
        for i in env_ids.iter() {
            for v in bias.row_mut(i).iter_mut() {
                *v = op.combine(0.0, cfg.sample(rng));
            }
        }
    }

    pub fn apply(&self, data: &mut Array2<f32>, rng: &mut SimRng) {
        self.noise.apply(data, rng);
        if let Some(bias) = &self.bias {
            *data += bias;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    #[test]
    fn uniform_noise_stays_in_band() {
        let mut data = Array2::from_elem((8, 4), 1.0);
        NoiseCfg::uniform(-0.1, 0.1).apply(&mut data, &mut seeded(1));
        assert!(data.iter().all(|&v| (0.9..1.1).contains(&v)));
    }

    #[test]
    fn scale_and_abs_operations() {
        let mut data = Array2::from_elem((1, 2), 2.0);
        NoiseCfg::Constant {
            bias: 3.0,
            operation: NoiseOperation::Scale,
        }
        .apply(&mut data, &mut seeded(0));
        assert_eq!(data[[0, 0]], 6.0);

        NoiseCfg::Constant {
            bias: -1.0,
            operation: NoiseOperation::Abs,
        }
        .apply(&mut data, &mut seeded(0));
        assert_eq!(data[[0, 1]], -1.0);
    }

    #[test]
    fn bias_is_resampled_only_for_reset_envs() {
        let cfg = ObservationNoise::Model(NoiseModelCfg {
            noise: NoiseCfg::constant(0.0),
            bias: Some(NoiseCfg::uniform(-1.0, 1.0)),
        });
        let mut model = NoiseModel::new(&cfg, 3, 2);
        let mut rng = seeded(9);
        model.reset(&EnvIds::all(3), &mut rng);
        let before = model.bias().unwrap().clone();
        model.reset(&EnvIds::from_indices(3, &[1]), &mut rng);
        let after = model.bias().unwrap();
        assert_eq!(before.row(0), after.row(0));
        assert_eq!(before.row(2), after.row(2));
        assert_ne!(before.row(1), after.row(1));
    }

    #[test]
    fn bias_is_held_between_steps() {
        let cfg = ObservationNoise::Model(NoiseModelCfg {
            noise: NoiseCfg::constant(0.0),
            bias: Some(NoiseCfg::constant(0.5)),
        });
        let mut model = NoiseModel::new(&cfg, 2, 1);
        let mut rng = seeded(0);
        model.reset(&EnvIds::all(2), &mut rng);
        for _ in 0..3 {
            let mut data = Array2::zeros((2, 1));
            model.apply(&mut data, &mut rng);
            assert_eq!(data, Array2::from_elem((2, 1), 0.5));
        }
    }

    #[test]
    fn deserializes_plain_and_model_forms() {
        let plain: ObservationNoise =
            serde_json::from_str(r#"{"type": "uniform", "n_min": -0.2, "n_max": 0.2}"#).unwrap();
        assert_eq!(plain, ObservationNoise::Plain(NoiseCfg::uniform(-0.2, 0.2)));

        let model: ObservationNoise = serde_json::from_str(
            r#"{"noise": {"type": "gaussian", "std": 0.1}, "bias": {"type": "constant", "bias": 0.3}}"#,
        )
        .unwrap();
        assert!(matches!(model, ObservationNoise::Model(_)));
    }
}
