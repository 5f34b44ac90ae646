//! # balancing_env
//!
//! Single-leg balancing for a 29-joint humanoid, built on [`lockstep`].
//!
//! Each episode picks a standing leg at random. The policy is rewarded for
//! staying upright with the other foot lifted into a target height band,
//! and penalized for drifting and for jerky actions.
//!
//! ## Modules
//!
//! - [`robot`]: joint and body names, default pose, actuation constants
//! - [`sim`]: [`BipedSim`], a kinematic stand-in for the physics backend
//! - [`mdp`]: standing-leg aware observation, reward, termination and event terms
//! - [`config`]: term vocabulary, [`BalancingEnvCfg::flat`] and [`BalancingEnvCfg::play`]
//! - [`env`]: [`BalancingEnv`], the learner-facing wrapper
//!
//! # Example
//!
//! ```ignore
//! use balancing_env::{BalancingEnv, BalancingEnvCfg};
//! use ndarray::Array2;
//!
//! let mut env = BalancingEnv::from_config(&BalancingEnvCfg::flat(64).with_seed(42))?;
//! let obs = env.reset()?;
//! let actions = Array2::zeros((env.num_envs(), env.action_dim()));
//! let out = env.step(actions.view())?;
//! println!("mean reward {}", out.rewards.mean().unwrap_or_default());
//! ```

pub mod config;
pub mod env;
pub mod mdp;
pub mod robot;
pub mod sim;

pub use config::{
    BalancingAction, BalancingDone, BalancingEnvCfg, BalancingEvent, BalancingObs,
    BalancingReward, BalancingTerms,
};
pub use env::BalancingEnv;
pub use sim::{BipedSim, BipedSimCfg};

#[cfg(test)]
pub mod tests;
