use ndarray::Array1;

use lockstep::{EnvContext, EvalError, Simulation, TerminationTerm};

use super::{other, standing_legs, FootContacts};
use crate::robot::ROBOT;

/// The raised foot touched the ground.
#[derive(Debug, Clone, Default)]
pub struct RaisedFootContact;

impl<S: Simulation> TerminationTerm<S> for RaisedFootContact {
    fn compute(&mut self, env: &EnvContext<S>) -> Result<Array1<bool>, EvalError> {
        let contacts = FootContacts::read(env.entity(ROBOT)?)?;
        let legs = standing_legs(env)?;
        Ok(Array1::from_shape_fn(env.num_envs(), |i| {
            contacts.in_contact(i, other(legs[i]))
        }))
    }
}
