//! Packed subsets of environment indices.
//!
//! [`EnvIds`] names the environments an operation applies to: the ones being
//! reset, the ones an event fires for, the ones whose scratch state is cleared.
//! Bits are packed into u64 chunks so that iterating a sparse subset costs
//! O(k) in the number of selected environments.

use ndarray::Array1;

// ============================================================================
// EnvIds
// ============================================================================

/// Bitset over `0..num_envs`.
///
/// # Example
///
/// ```rust
/// use lockstep::EnvIds;
///
/// let ids = EnvIds::from_indices(100, &[3, 70]);
/// assert_eq!(ids.iter().collect::<Vec<_>>(), vec![3, 70]);
/// assert!(ids.contains(70));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvIds {
    /// Packed chunks (64 environments per u64)
    chunks: Vec<u64>,
    num_envs: usize,
}

impl EnvIds {
    /// Empty subset.
    pub fn none(num_envs: usize) -> Self {
        Self {
            chunks: vec![0u64; num_envs.div_ceil(64)],
            num_envs,
        }
    }

    /// Every environment in the batch.
    pub fn all(num_envs: usize) -> Self {
        let mut chunks = vec![u64::MAX; num_envs.div_ceil(64)];
        let tail = num_envs % 64;
        if tail != 0 {
            if let Some(last) = chunks.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
        Self { chunks, num_envs }
    }

    /// Subset of the environments whose flag is set.
    pub fn from_mask(flags: &Array1<bool>) -> Self {
        let mut ids = Self::none(flags.len());
        for (i, &flag) in flags.iter().enumerate() {
            if flag {
                ids.chunks[i / 64] |= 1u64 << (i % 64);
            }
        }
        ids
    }

    /// Subset of environments that either terminated or timed out.
    pub fn from_done_flags(terminated: &Array1<bool>, time_outs: &Array1<bool>) -> Self {
        debug_assert_eq!(terminated.len(), time_outs.len());
        let mut ids = Self::none(terminated.len());
        for (i, (&t, &tr)) in terminated.iter().zip(time_outs.iter()).enumerate() {
            if t || tr {
                ids.chunks[i / 64] |= 1u64 << (i % 64);
            }
        }
        ids
    }

    /// Subset built from explicit indices. Out-of-range indices are ignored.
    pub fn from_indices(num_envs: usize, indices: &[usize]) -> Self {
        let mut ids = Self::none(num_envs);
        for &i in indices {
            debug_assert!(i < num_envs, "env index {i} out of range for {num_envs} envs");
            if i < num_envs {
                ids.set(i);
            }
        }
        ids
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.chunks.iter().any(|&c| c != 0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Number of selected environments.
    pub fn count(&self) -> usize {
        self.chunks.iter().map(|c| c.count_ones() as usize).sum()
    }

    /// Size of the batch this subset is drawn from.
    #[inline]
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    #[inline]
    pub fn set(&mut self, env_idx: usize) {
        debug_assert!(env_idx < self.num_envs);
        self.chunks[env_idx / 64] |= 1u64 << (env_idx % 64);
    }

    #[inline]
    pub fn clear(&mut self, env_idx: usize) {
        debug_assert!(env_idx < self.num_envs);
        self.chunks[env_idx / 64] &= !(1u64 << (env_idx % 64));
    }

    #[inline]
    pub fn contains(&self, env_idx: usize) -> bool {
        env_idx < self.num_envs && (self.chunks[env_idx / 64] >> (env_idx % 64)) & 1 != 0
    }

    /// Selected indices in ascending order.
    ///
    /// Uses `trailing_zeros()` so the cost is O(k) in the number of set bits.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let last = self.chunks.len().saturating_sub(1);
        self.chunks.iter().enumerate().flat_map(move |(chunk_idx, &chunk)| {
            let base = chunk_idx * 64;
            let max_bit = if chunk_idx == last { self.num_envs - base } else { 64 };
            BitIter::new(chunk, max_bit).map(move |bit| base + bit)
        })
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Dense boolean mask of length `num_envs`.
    pub fn to_mask(&self) -> Array1<bool> {
        Array1::from_shape_fn(self.num_envs, |i| self.contains(i))
    }

    /// Environments selected in both subsets.
    pub fn intersection(&self, other: &EnvIds) -> EnvIds {
        debug_assert_eq!(self.num_envs, other.num_envs);
        EnvIds {
            chunks: self
                .chunks
                .iter()
                .zip(other.chunks.iter())
                .map(|(a, b)| a & b)
                .collect(),
            num_envs: self.num_envs,
        }
    }
}

/// Iterates set bits of one chunk, lowest first.
struct BitIter {
    remaining: u64,
    max_bit: usize,
}

impl BitIter {
    fn new(bits: u64, max_bit: usize) -> Self {
        Self {
            remaining: bits,
            max_bit,
        }
    }
}

impl Iterator for BitIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let bit = self.remaining.trailing_zeros() as usize;
        if bit >= self.max_bit {
            self.remaining = 0;
            None
        } else {
            self.remaining &= self.remaining - 1;
            Some(bit)
        }
    }
}
