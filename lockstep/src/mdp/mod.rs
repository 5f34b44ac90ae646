//! Reusable term implementations for articulated robots.
//!
//! Task crates wrap these in their own term enums alongside task-specific
//! terms. Every constructor resolves names against the scene once and fails
//! with a [`ConfigError`](crate::ConfigError) if they do not match.

mod actions;
mod events;
mod observations;
mod rewards;
mod terminations;

pub use actions::{ActionScale, JointPositionAction, JointPositionActionCfg};
pub use events::{AxisRanges, PushBySettingVelocity, ResetJointsByScale, ResetRootStateUniform};
pub use observations::{JointStateRel, LastAction, RootQuantity, RootState};
pub use rewards::{ActionL2, ActionRateL2, AngVelXyL2, FlatOrientationL2, IsAlive, JointVelL2};
pub use terminations::{BadOrientation, RootHeightBelowMinimum, TimeOut};
