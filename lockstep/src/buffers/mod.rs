//! Rolling buffers behind observation delay and history stacking.

mod circular;
mod delay;

pub use circular::CircularBuffer;
pub use delay::{DelayBuffer, DelayCfg};
