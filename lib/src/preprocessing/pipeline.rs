//! Ordered execution of preprocessing stages.
//!
//! A [`Stage`] wraps a [`Preprocessor`] together with its caching policy. The
//! [`PipelineRunner`] feeds the output of each stage into the next one and
//! stops at the first failure, reporting which stage failed.

use super::cache::{cache_key, PreprocessingCache};
use super::traits::Preprocessor;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use std::time::Instant;
use tracing::{info, warn};

/// A preprocessor plus its cache opt-out flag.
///
/// The cache key covers the concrete preprocessor type as well as its name,
/// so two types reporting the same name never share entries.
pub struct Stage {
    preprocessor: Box<dyn Preprocessor>,
    kind: &'static str,
    cached: bool,
}

impl Stage {
    pub fn new<P: Preprocessor + 'static>(preprocessor: P) -> Self {
        Self {
            preprocessor: Box::new(preprocessor),
            kind: std::any::type_name::<P>(),
            cached: true,
        }
    }

    /// Always run the preprocessor, never consult or fill the cache.
    pub fn no_cache(mut self) -> Self {
        self.cached = false;
        self
    }

    pub fn name(&self) -> &str {
        self.preprocessor.name()
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Runs the stage on `dataset`, serving the result from `cache` when possible.
    ///
    /// Cache failures never fail the stage: an unreadable entry is a miss and a
    /// failed write is logged and skipped.
    pub fn apply(&self, dataset: Dataset, cache: Option<&PreprocessingCache>) -> Result<Dataset> {
        let cache = match cache {
            Some(cache) if self.cached => cache,
            _ => return self.preprocessor.process(dataset),
        };

        let identity = format!("{}@{}", self.name(), self.kind);
        let key = cache_key(&identity, &self.preprocessor.params(), &dataset)?;
        if let Some(hit) = cache.get(self.name(), &key) {
            return Ok(hit);
        }

        let output = self.preprocessor.process(dataset)?;
        if let Err(e) = cache.put(self.name(), &key, &output) {
            warn!(stage = self.name(), error = %e, "failed to store stage output");
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("cached", &self.cached)
            .finish()
    }
}

/// Runs `stages` in order on `dataset`.
///
/// # Errors
/// The first stage error, wrapped in [`PipelineError::StageFailed`].
pub fn run(stages: &[Stage], dataset: Dataset, cache: Option<&PreprocessingCache>) -> Result<Dataset> {
    let mut dataset = dataset;
    for stage in stages {
        let started = Instant::now();
        let rows_in = dataset.len();
        let hits_before = cache.map(|c| c.stats().hits).unwrap_or(0);

        dataset = stage
            .apply(dataset, cache)
            .map_err(|e| PipelineError::StageFailed {
                stage: stage.name().to_string(),
                source: Box::new(e),
            })?;

        let cache_hit = cache.map(|c| c.stats().hits > hits_before).unwrap_or(false);
        info!(
            stage = stage.name(),
            rows_in,
            rows_out = dataset.len(),
            columns = dataset.table.n_cols(),
            cache_hit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stage finished"
        );
    }
    Ok(dataset)
}

/// Builder-style owner of a stage list and an optional cache.
///
/// # Example
/// ```rust
/// use atow::dataset::Dataset;
/// use atow::preprocessing::{DerivedFeaturePreprocessor, PipelineRunner, Stage};
/// use atow::table::{Column, Table};
///
/// let table = Table::from_columns(vec![Column::from_strs("date", &["2022-01-03"])]).unwrap();
/// let dataset = Dataset::new(table, "flights");
///
/// let runner = PipelineRunner::new(None).stage(Stage::new(DerivedFeaturePreprocessor::new()));
/// let out = runner.run(dataset).unwrap();
/// assert!(out.table.has_column("day_of_week"));
/// ```
#[derive(Debug, Default)]
pub struct PipelineRunner {
    stages: Vec<Stage>,
    cache: Option<PreprocessingCache>,
}

impl PipelineRunner {
    pub fn new(cache: Option<PreprocessingCache>) -> Self {
        Self {
            stages: Vec::new(),
            cache,
        }
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn cache(&self) -> Option<&PreprocessingCache> {
        self.cache.as_ref()
    }

    pub fn run(&self, dataset: Dataset) -> Result<Dataset> {
        info!(
            dataset = %dataset.name,
            rows = dataset.len(),
            stages = self.stages.len(),
            "running preprocessing pipeline"
        );
        run(&self.stages, dataset, self.cache.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Table};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scale {
        factor: f64,
        calls: Arc<AtomicUsize>,
    }

    impl Preprocessor for Scale {
        fn name(&self) -> &str {
            "scale"
        }

        fn params(&self) -> serde_json::Value {
            serde_json::json!({ "factor": self.factor })
        }

        fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scaled: Vec<f64> = dataset
                .table
                .dense_f64("tow")?
                .into_iter()
                .map(|v| v * self.factor)
                .collect();
            dataset.table.insert_column(Column::from_f64s("tow", &scaled))?;
            Ok(dataset)
        }
    }

    struct Fail;

    impl Preprocessor for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn process(&self, _dataset: Dataset) -> Result<Dataset> {
            Err(PipelineError::Config("reference file missing".to_string()))
        }
    }

    fn dataset() -> Dataset {
        let table = Table::from_columns(vec![Column::from_f64s("tow", &[1.0, 2.0])]).unwrap();
        Dataset::new(table, "d")
    }

    fn scale(factor: f64, calls: &Arc<AtomicUsize>) -> Stage {
        Stage::new(Scale {
            factor,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn test_stages_run_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = PipelineRunner::new(None)
            .stage(scale(2.0, &calls))
            .stage(scale(10.0, &calls));
        let out = runner.run(dataset()).unwrap();
        assert_eq!(out.table.dense_f64("tow").unwrap(), vec![20.0, 40.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.stage_names(), vec!["scale", "scale"]);
    }

    #[test]
    fn test_cached_stage_skips_recomputation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PreprocessingCache::open(dir.path(), 1 << 20).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = scale(3.0, &calls);

        let first = stage.apply(dataset(), Some(&cache)).unwrap();
        let second = stage.apply(dataset(), Some(&cache)).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_params_do_not_share_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PreprocessingCache::open(dir.path(), 1 << 20).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = scale(2.0, &calls).apply(dataset(), Some(&cache)).unwrap();
        let b = scale(5.0, &calls).apply(dataset(), Some(&cache)).unwrap();
        assert_ne!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Reports the same name and params as `Scale` but does something else.
    struct Impostor;

    impl Preprocessor for Impostor {
        fn name(&self) -> &str {
            "scale"
        }

        fn params(&self) -> serde_json::Value {
            serde_json::json!({ "factor": 2.0 })
        }

        fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
            dataset.table.insert_column(Column::from_f64s("tow", &[0.0, 0.0]))?;
            Ok(dataset)
        }
    }

    #[test]
    fn test_same_name_different_type_do_not_share_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PreprocessingCache::open(dir.path(), 1 << 20).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let scaled = scale(2.0, &calls).apply(dataset(), Some(&cache)).unwrap();
        let zeroed = Stage::new(Impostor).apply(dataset(), Some(&cache)).unwrap();
        assert_eq!(scaled.table.dense_f64("tow").unwrap(), vec![2.0, 4.0]);
        assert_eq!(zeroed.table.dense_f64("tow").unwrap(), vec![0.0, 0.0]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_no_cache_stage_always_runs() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PreprocessingCache::open(dir.path(), 1 << 20).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = scale(2.0, &calls).no_cache();
        assert!(!stage.is_cached());

        stage.apply(dataset(), Some(&cache)).unwrap();
        stage.apply(dataset(), Some(&cache)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failure_names_the_stage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = PipelineRunner::new(None)
            .stage(Stage::new(Fail))
            .stage(scale(2.0, &calls));
        let err = runner.run(dataset()).unwrap_err();
        match &err {
            PipelineError::StageFailed { stage, .. } => assert_eq!(stage, "fail"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_config());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_runner_is_identity() {
        let runner = PipelineRunner::default();
        assert!(runner.is_empty());
        assert_eq!(runner.run(dataset()).unwrap(), dataset());
    }
}
