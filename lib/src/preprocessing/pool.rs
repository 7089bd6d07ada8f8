//! Fixed-size worker pool for per-key lookups inside a stage.
//!
//! Stages that resolve each distinct key (airport code, station) independently
//! fan the work out here and wait for all of it before continuing.

use crate::error::{PipelineError, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// `workers == 0` picks the number of logical CPUs.
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("atow-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot start worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Applies `f` to every work item and re-keys the results by identifier.
    ///
    /// Returns once every worker has stopped. The first failure stops the batch
    /// and the partial results are discarded.
    pub fn map_keyed<K, T, R, F>(&self, items: Vec<(K, T)>, f: F) -> Result<HashMap<K, R>>
    where
        K: Eq + Hash + Send,
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Send + Sync,
    {
        self.pool.install(|| {
            items
                .into_par_iter()
                .map(|(k, item)| f(item).map(|r| (k, r)))
                .collect::<Result<HashMap<K, R>>>()
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers())
            .finish()
    }
}
