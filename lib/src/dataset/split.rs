//! Seeded train/test splitting and k-fold partitioning.
//!
//! `split` uses exact-fraction sampling: `round(train_percent * n)` rows are
//! drawn through a seeded permutation and the rest form the test partition.
//! Both partitions keep the original relative row order.

use super::Dataset;
use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_TRAIN_PERCENT: f64 = 0.8;
pub const DEFAULT_SPLIT_SEED: u64 = 0;

fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

/// Sizes of `k` folds over `n` rows: the first `n % k` folds get one extra row.
pub fn fold_sizes(n: usize, k: usize) -> Vec<usize> {
    (0..k)
        .map(|i| n / k + usize::from(i < n % k))
        .collect()
}

impl Dataset {
    fn subset(&self, mut rows: Vec<usize>, label: &str) -> Result<Dataset> {
        rows.sort_unstable();
        Ok(Dataset::new(
            self.table.take(&rows)?,
            format!("{}[{}]", self.name, label),
        ))
    }

    /// Splits into `(train, test)` with exactly `round(train_percent * n)` train rows.
    ///
    /// # Errors
    /// [`PipelineError::InvalidArgument`] unless `0 < train_percent <= 1`.
    pub fn split(&self, train_percent: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(train_percent > 0.0 && train_percent <= 1.0) {
            return Err(PipelineError::InvalidArgument(format!(
                "train_percent must be in (0, 1], got {}",
                train_percent
            )));
        }
        let n = self.len();
        let n_train = (train_percent * n as f64).round() as usize;
        let mut order = permutation(n, seed);
        let test_rows = order.split_off(n_train.min(n));

        Ok((self.subset(order, "train")?, self.subset(test_rows, "test")?))
    }

    /// Partitions rows into `k` disjoint folds and returns one `(train, test)`
    /// pair per fold. Every row is in exactly one test fold and `k - 1` train folds.
    ///
    /// # Errors
    /// [`PipelineError::InvalidArgument`] unless `2 <= k <= n`.
    pub fn k_fold_split(&self, k: usize, seed: u64) -> Result<Vec<(Dataset, Dataset)>> {
        let n = self.len();
        if k < 2 || k > n {
            return Err(PipelineError::InvalidArgument(format!(
                "k must be in [2, {}], got {}",
                n, k
            )));
        }
        let order = permutation(n, seed);

        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for size in fold_sizes(n, k) {
            folds.push(order[start..start + size].to_vec());
            start += size;
        }

        (0..k)
            .map(|i| {
                let test_rows = folds[i].clone();
                let train_rows: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                Ok((
                    self.subset(train_rows, &format!("fold {}/{} train", i + 1, k))?,
                    self.subset(test_rows, &format!("fold {}/{} test", i + 1, k))?,
                ))
            })
            .collect()
    }
}
