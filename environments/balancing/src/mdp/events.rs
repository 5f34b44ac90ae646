use lockstep::rng::random_int_inclusive;
use lockstep::{EnvContext, EnvIds, EvalError, EventTerm, ScratchKey, ScratchReset, Simulation};

use super::{LEFT, RIGHT};

/// Standing leg per environment. Rewritten on every reset by
/// [`RandomizeStandingLeg`], so resets leave it to the owner.
pub const STANDING_LEG: ScratchKey<i64> = ScratchKey::new("standing_leg_choice", ScratchReset::Owner);

/// Draw a fresh standing leg for each reset environment.
#[derive(Debug, Clone, Default)]
pub struct RandomizeStandingLeg;

impl<S: Simulation> EventTerm<S> for RandomizeStandingLeg {
    fn apply(&mut self, env: &mut EnvContext<S>, env_ids: &EnvIds) -> Result<(), EvalError> {
        let draws: Vec<i64> = env_ids
            .iter()
            .map(|_| random_int_inclusive(&mut env.rng, LEFT, RIGHT) as i64)
            .collect();
        let legs = env.extras.get_or_insert(&STANDING_LEG)?;
        for (i, leg) in env_ids.iter().zip(draws) {
            legs[i] = leg;
        }
        log::trace!("standing legs redrawn for {} envs", env_ids.count());
        Ok(())
    }
}
