//! Term managers.
//!
//! Each manager owns an ordered set of resolved terms of one kind and the
//! bookkeeping around them. Managers never hold the environment; they borrow
//! an [`EnvContext`](crate::EnvContext) for each call.

mod action;
mod event;
mod observation;
mod reward;
mod term;
mod termination;

pub use action::{ActionManager, ActionTerm, ActionTermCfg};
pub use event::{EventManager, EventMode, EventTerm, EventTermCfg};
pub use observation::{
    GroupObs, ObsScale, ObservationCfg, ObservationGroupCfg, ObservationManager, ObservationTerm,
    ObservationTermCfg, Observations,
};
pub use reward::{RewardManager, RewardTerm, RewardTermCfg, RewardTermValues};
pub use term::{ManagerTermCfg, ResolveTerm, TermRegistry};
pub use termination::{TerminationManager, TerminationTerm, TerminationTermCfg};
