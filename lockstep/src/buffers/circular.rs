//! Fixed-length rolling history per environment.

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis, Zip};

use crate::env_ids::EnvIds;
use crate::error::ConfigError;

/// Rolling buffer of the last `max_len` pushes for each environment.
///
/// Storage is `(N, max_len, F)` with one write pointer shared by the batch.
/// The first push after construction or after an environment's reset fills
/// every slot for that environment, so reads never observe stale data from a
/// previous episode.
#[derive(Debug, Clone)]
pub struct CircularBuffer {
    max_len: usize,
    feature_dim: usize,
    data: Array3<f32>,
    /// Slot written by the most recent push.
    pointer: usize,
    num_pushes: Array1<u64>,
}

impl CircularBuffer {
    pub fn new(max_len: usize, num_envs: usize, feature_dim: usize) -> Result<Self, ConfigError> {
        if max_len == 0 {
            return Err(ConfigError::invalid(
                "max_len",
                "circular buffer needs at least one slot",
            ));
        }
        Ok(Self {
            max_len,
            feature_dim,
            data: Array3::zeros((num_envs, max_len, feature_dim)),
            pointer: max_len - 1,
            num_pushes: Array1::zeros(num_envs),
        })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn num_envs(&self) -> usize {
        self.num_pushes.len()
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Valid entries per environment, capped at `max_len`.
    pub fn current_length(&self) -> Array1<usize> {
        self.num_pushes
            .mapv(|n| (n as usize).min(self.max_len))
    }

    /// Forget history for `env_ids`. Other environments are untouched.
    pub fn reset(&mut self, env_ids: &EnvIds) {
        for i in env_ids.iter() {
            self.num_pushes[i] = 0;
            self.data.index_axis_mut(Axis(0), i).fill(0.0);
        }
    }

    /// Push one `(N, F)` sample.
    pub fn append(&mut self, values: ArrayView2<f32>) {
        debug_assert_eq!(values.dim(), (self.num_envs(), self.feature_dim));
        self.pointer = (self.pointer + 1) % self.max_len;
        let pointer = self.pointer;
        Zip::from(self.data.outer_iter_mut())
            .and(values.rows())
            .and(&mut self.num_pushes)
            .for_each(|mut env_buf, row, pushes| {
                if *pushes == 0 {
                    for mut slot in env_buf.outer_iter_mut() {
                        slot.assign(&row);
                    }
                } else {
                    env_buf.row_mut(pointer).assign(&row);
                }
                *pushes += 1;
            });
    }

    /// Sample `lags[i]` pushes back for each environment (0 = newest).
    ///
    /// Lags beyond the available history clamp to the oldest valid entry.
    pub fn get(&self, lags: &Array1<usize>) -> Array2<f32> {
        debug_assert_eq!(lags.len(), self.num_envs());
        let mut out = Array2::zeros((self.num_envs(), self.feature_dim));
        let zip = Zip::indexed(out.rows_mut())
            .and(lags)
            .and(&self.num_pushes);
        let gather = |i: usize, mut row: ndarray::ArrayViewMut1<f32>, &lag: &usize, &pushes: &u64| {
            if pushes == 0 {
                return;
            }
            let valid = (pushes as usize).min(self.max_len);
            let lag = lag.min(valid - 1);
            let slot = (self.pointer + self.max_len - lag) % self.max_len;
            row.assign(&self.data.slice(s![i, slot, ..]));
        };
        #[cfg(feature = "parallel")]
        zip.par_for_each(gather);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(gather);
        out
    }

    /// Full history `(N, max_len, F)`, oldest first.
    pub fn buffer(&self) -> Array3<f32> {
        let mut out = Array3::zeros(self.data.dim());
        for k in 0..self.max_len {
            let slot = (self.pointer + 1 + k) % self.max_len;
            out.slice_mut(s![.., k, ..])
                .assign(&self.data.slice(s![.., slot, ..]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn push_scalar(buf: &mut CircularBuffer, values: &[f32]) {
        let a = Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap();
        buf.append(a.view());
    }

    #[test]
    fn first_push_backfills() {
        let mut buf = CircularBuffer::new(3, 2, 1).unwrap();
        push_scalar(&mut buf, &[5.0, 6.0]);
        assert_eq!(buf.buffer().slice(s![0, .., 0]).to_vec(), vec![5.0, 5.0, 5.0]);
        assert_eq!(buf.get(&array![2, 2]), array![[5.0], [6.0]]);
    }

    #[test]
    fn buffer_is_oldest_first() {
        let mut buf = CircularBuffer::new(3, 1, 1).unwrap();
        for v in 1..=5 {
            push_scalar(&mut buf, &[v as f32]);
        }
        assert_eq!(buf.buffer().slice(s![0, .., 0]).to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!(buf.get(&array![0]), array![[5.0]]);
        assert_eq!(buf.get(&array![2]), array![[3.0]]);
    }

    #[test]
    fn reset_is_per_env() {
        let mut buf = CircularBuffer::new(2, 2, 1).unwrap();
        push_scalar(&mut buf, &[1.0, 1.0]);
        push_scalar(&mut buf, &[2.0, 2.0]);
        buf.reset(&EnvIds::from_indices(2, &[0]));
        push_scalar(&mut buf, &[9.0, 3.0]);
        assert_eq!(buf.buffer().slice(s![0, .., 0]).to_vec(), vec![9.0, 9.0]);
        assert_eq!(buf.buffer().slice(s![1, .., 0]).to_vec(), vec![2.0, 3.0]);
        assert_eq!(buf.current_length().to_vec(), vec![1, 2]);
    }

    #[test]
    fn zero_length_rejected() {
        assert!(CircularBuffer::new(0, 1, 1).is_err());
    }
}
