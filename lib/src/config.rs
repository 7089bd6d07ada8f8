//! Run configuration, loaded from a JSON file.
//!
//! Every field has a default, so a config file only needs the values that
//! differ. After loading, `ATOW_CACHE_DIR` overrides the cache directory.
//!
//! ```json
//! {
//!   "paths": { "training": "data/challenge_set.csv", "airports": "data/airports.csv" },
//!   "split": { "k_folds": 5 },
//!   "model": { "time_limit_secs": 30, "preset": "best" }
//! }
//! ```

use crate::error::{PipelineError, Result};
use crate::model::Preset;
use crate::preprocessing::{
    AircraftPerformancePreprocessor, AirportPreprocessor, CleanDatasetPreprocessor,
    CsvObservationSource, DerivedFeaturePreprocessor, FuelPricePreprocessor, PaxFlowPreprocessor,
    PipelineRunner, PreprocessingCache, RetryPolicy, RunwayPreprocessor, Stage,
    TrajectoryPreprocessor, WeatherPreprocessor, WorkerPool, DEFAULT_BYTES_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides [`CacheConfig::dir`].
pub const CACHE_DIR_ENV: &str = "ATOW_CACHE_DIR";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Input files. Optional reference inputs disable their stage when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub training: PathBuf,
    pub airports: Option<PathBuf>,
    pub runways: Option<PathBuf>,
    pub aircraft: Option<PathBuf>,
    pub fuel_prices: Option<PathBuf>,
    /// Monthly airport traffic statistics.
    pub passenger_stats: Option<PathBuf>,
    /// Directory of per-station observation CSVs.
    pub weather_dir: Option<PathBuf>,
    pub trajectory_store: Option<PathBuf>,
    /// Where predictions and saved models go.
    pub output_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            training: PathBuf::from("data/challenge_set.csv"),
            airports: None,
            runways: None,
            aircraft: None,
            fuel_prices: None,
            passenger_stats: None,
            weather_dir: None,
            trajectory_store: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub bytes_limit: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("cache"),
            bytes_limit: DEFAULT_BYTES_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_percent: f64,
    pub seed: u64,
    pub k_folds: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_percent: crate::dataset::DEFAULT_TRAIN_PERCENT,
            seed: crate::dataset::DEFAULT_SPLIT_SEED,
            k_folds: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub time_limit_secs: u64,
    pub preset: Preset,
    pub round_to: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: crate::model::DEFAULT_TIME_LIMIT.as_secs(),
            preset: Preset::default(),
            round_to: None,
        }
    }
}

impl ModelConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: DataPaths,
    pub cache: CacheConfig,
    pub split: SplitConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
    pub retry: RetryPolicy,
    /// Worker threads for per-key lookups; 0 uses every CPU.
    pub workers: usize,
}

impl PipelineConfig {
    /// Reads, applies environment overrides and validates.
    ///
    /// # Errors
    /// `Config` if the file is unreadable, malformed or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("JSON parse error: {}", e)))?;
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up through `lookup` (normally the process environment).
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            self.cache.dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let split = &self.split;
        if !(split.train_percent > 0.0 && split.train_percent <= 1.0) {
            return Err(PipelineError::Config(format!(
                "split.train_percent must be in (0, 1], got {}",
                split.train_percent
            )));
        }
        if split.k_folds < 2 {
            return Err(PipelineError::Config(format!(
                "split.k_folds must be at least 2, got {}",
                split.k_folds
            )));
        }
        if self.cache.enabled && self.cache.bytes_limit == 0 {
            return Err(PipelineError::Config("cache.bytes_limit must be positive".to_string()));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(PipelineError::Config(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config("retry.max_attempts must be positive".to_string()));
        }
        Ok(())
    }

    /// Opens the preprocessing cache, or `None` when caching is disabled.
    pub fn open_cache(&self) -> Result<Option<PreprocessingCache>> {
        if !self.cache.enabled {
            return Ok(None);
        }
        PreprocessingCache::open(&self.cache.dir, self.cache.bytes_limit).map(Some)
    }

    /// Assembles the standard stage list for the configured inputs.
    ///
    /// Lookups run first, then the weather join and the date features, and
    /// the timestamp normalization last. Stages whose input is not configured
    /// are left out.
    pub fn build_runner(&self) -> Result<PipelineRunner> {
        let pool = Arc::new(WorkerPool::new(self.workers)?);
        let paths = &self.paths;
        let mut runner = PipelineRunner::new(self.open_cache()?);

        if let Some(path) = &paths.airports {
            runner = runner.stage(Stage::new(AirportPreprocessor::new(path).with_pool(pool.clone())));
        }
        if let Some(path) = &paths.runways {
            runner = runner.stage(Stage::new(RunwayPreprocessor::new(path).with_pool(pool.clone())));
        }
        if let Some(path) = &paths.aircraft {
            runner = runner.stage(Stage::new(AircraftPerformancePreprocessor::new(path)));
        }
        if let Some(path) = &paths.fuel_prices {
            runner = runner.stage(Stage::new(FuelPricePreprocessor::new(path)));
        }
        if let Some(path) = &paths.passenger_stats {
            runner = runner.stage(Stage::new(PaxFlowPreprocessor::new(path)));
        }
        if let Some(dir) = &paths.weather_dir {
            let source = Arc::new(CsvObservationSource::new(dir));
            runner = runner.stage(Stage::new(
                WeatherPreprocessor::new(source)
                    .with_retry(self.retry)
                    .with_pool(pool.clone()),
            ));
        }
        if let Some(store) = &paths.trajectory_store {
            runner = runner.stage(Stage::new(TrajectoryPreprocessor::new(store)));
        }
        runner = runner
            .stage(Stage::new(DerivedFeaturePreprocessor::new()))
            .stage(Stage::new(CleanDatasetPreprocessor::new()).no_cache());

        info!(stages = ?runner.stage_names(), workers = pool.workers(), "pipeline assembled");
        Ok(runner)
    }
}
