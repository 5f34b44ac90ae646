//! Random number generation shared by noise models, delay buffers and events.
//!
//! A single seeded stream lives on the environment context. Consumers draw
//! from it in a fixed order so that a run is reproducible from its seed.

use rand::{Rng, SeedableRng};
pub use rand_xoshiro::Xoshiro256StarStar;

pub type SimRng = Xoshiro256StarStar;

pub fn seeded(seed: u64) -> SimRng {
    Xoshiro256StarStar::seed_from_u64(seed)
}

/// Uniform float in `[low, high)`. Returns `low` when the range is empty.
#[inline]
pub fn random_uniform(rng: &mut SimRng, low: f32, high: f32) -> f32 {
    if high <= low {
        return low;
    }
    rng.gen::<f32>() * (high - low) + low
}

/// Gaussian sample via the Box-Muller transform.
#[inline]
pub fn random_gaussian(rng: &mut SimRng, mean: f32, std: f32) -> f32 {
    // Avoid ln(0)
    let u1 = rng.gen::<f32>().max(1e-10);
    let u2 = rng.gen::<f32>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
    mean + std * z
}

/// Integer in `[low, high]`.
#[inline]
pub fn random_int_inclusive(rng: &mut SimRng, low: usize, high: usize) -> usize {
    if high <= low {
        return low;
    }
    rng.gen_range(low..=high)
}
