//! Time-boxed model search.
//!
//! [`AutoMlModel`] walks a grid of [`LinearRegressorConfig`]s, scores each on
//! a seeded holdout and keeps the best. The wall-clock budget is soft: the
//! first candidate always finishes, later ones are skipped once the deadline
//! has passed, and a candidate that is running when the deadline passes stops
//! at the end of its current epoch.

use super::estimator::{LinearRegressor, LinearRegressorConfig, LossKind, SupervisedModel, SupervisedSettings};
use super::Model;
use crate::dataset::{Dataset, TARGET};
use crate::error::{PipelineError, Result};
use crate::evaluation::Metrics;
use crate::regularizers::Penalty;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default search budget.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(300);

/// File name of a saved predictor inside its run directory.
pub const PREDICTOR_FILE: &str = "predictor.bin";

const HOLDOUT_FRACTION: f64 = 0.8;

/// Size of the candidate grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Medium,
    #[default]
    High,
    Best,
}

impl Preset {
    /// Candidates in search order; the first is the cheapest.
    pub fn candidates(self) -> Vec<LinearRegressorConfig> {
        let (rates, penalties, losses, epochs): (&[f64], &[Penalty], &[LossKind], usize) = match self {
            Preset::Medium => (&[0.05], &[Penalty::None, Penalty::L2(0.01)], &[LossKind::Mse], 100),
            Preset::High => (
                &[0.01, 0.05],
                &[Penalty::None, Penalty::L2(0.01), Penalty::L1(0.01)],
                &[LossKind::Mse],
                200,
            ),
            Preset::Best => (
                &[0.01, 0.05, 0.1],
                &[Penalty::None, Penalty::L2(0.01), Penalty::L2(0.1), Penalty::L1(0.01)],
                &[LossKind::Mse, LossKind::Mae],
                500,
            ),
        };
        let mut grid = Vec::new();
        for &loss in losses {
            for &penalty in penalties {
                for &learning_rate in rates {
                    grid.push(LinearRegressorConfig {
                        learning_rate,
                        max_epochs: epochs,
                        loss,
                        penalty,
                        ..Default::default()
                    });
                }
            }
        }
        grid
    }
}

impl std::str::FromStr for Preset {
    type Err = PipelineError;

    /// Accepts `medium`, `high`, `best`, with or without a `_quality` suffix.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().trim_end_matches("_quality") {
            "medium" => Ok(Preset::Medium),
            "high" => Ok(Preset::High),
            "best" => Ok(Preset::Best),
            other => Err(PipelineError::Config(format!("unknown preset '{}'", other))),
        }
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub config: LinearRegressorConfig,
    pub holdout_mse: f64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoMlModel {
    name: String,
    time_limit: Duration,
    preset: Preset,
    seed: u64,
    best: Option<SupervisedModel<LinearRegressor>>,
    leaderboard: Vec<CandidateScore>,
}

impl Default for AutoMlModel {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_LIMIT, Preset::default())
    }
}

impl AutoMlModel {
    pub fn new(time_limit: Duration, preset: Preset) -> Self {
        Self {
            name: "AutoMlModel".to_string(),
            time_limit,
            preset,
            seed: 0,
            best: None,
            leaderboard: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Candidates in evaluation order.
    pub fn leaderboard(&self) -> &[CandidateScore] {
        &self.leaderboard
    }

    pub fn best_config(&self) -> Option<&LinearRegressorConfig> {
        self.best.as_ref().map(|m| m.regressor().config())
    }

    /// Writes the trained predictor to `<root>/ag-<YYYYMMDD_HHMMSS>/predictor.bin`
    /// and returns the run directory.
    pub fn save<P: AsRef<Path>>(&self, root: P) -> Result<PathBuf> {
        if self.best.is_none() {
            return Err(PipelineError::ModelState(
                "cannot save an untrained AutoML model".to_string(),
            ));
        }
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let dir = root.as_ref().join(format!("ag-{}", stamp));
        fs::create_dir_all(&dir)?;
        let bytes = bincode::serialize(self)?;
        fs::write(dir.join(PREDICTOR_FILE), bytes)?;
        info!(path = %dir.display(), "saved AutoML predictor");
        Ok(dir)
    }

    /// Loads a predictor saved by [`save`](Self::save). `path` may be the run
    /// directory or the predictor file itself.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = if path.is_dir() {
            path.join(PREDICTOR_FILE)
        } else {
            path.to_path_buf()
        };
        let bytes = fs::read(&file)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn candidate(&self, config: LinearRegressorConfig, deadline: Instant) -> SupervisedModel<LinearRegressor> {
        let settings = SupervisedSettings {
            test_size: 0.0,
            seed: self.seed,
            ..Default::default()
        };
        SupervisedModel::with_settings(LinearRegressor::new(config).with_deadline(Some(deadline)), settings)
    }
}

impl Model for AutoMlModel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn train(&mut self, data: &Table) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.time_limit;
        let labelled: Vec<bool> = data
            .column(TARGET)?
            .to_f64()?
            .iter()
            .map(|v| v.is_some_and(f64::is_finite))
            .collect();
        let dataset = Dataset::new(data.filter(&labelled)?, "automl");
        if dataset.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "no rows with a target value to train on".to_string(),
            ));
        }
        let (fit, holdout) = dataset.split(HOLDOUT_FRACTION, self.seed)?;
        // Tiny inputs leave nothing to score on; fit and score on everything.
        let (fit, holdout) = if holdout.is_empty() || fit.is_empty() {
            (dataset.clone(), dataset)
        } else {
            (fit, holdout)
        };
        let truth = holdout.table.dense_f64(TARGET)?;

        let grid = self.preset.candidates();
        info!(
            preset = ?self.preset,
            candidates = grid.len(),
            time_limit_s = self.time_limit.as_secs_f64(),
            "starting model search"
        );

        let mut leaderboard = Vec::new();
        let mut best: Option<(f64, SupervisedModel<LinearRegressor>)> = None;
        let mut last_error = None;
        for (i, config) in grid.into_iter().enumerate() {
            if i > 0 && Instant::now() >= deadline {
                warn!(evaluated = i, "time limit reached, stopping search");
                break;
            }
            let t0 = Instant::now();
            let mut model = self.candidate(config, deadline);
            // a diverging learning rate only disqualifies this candidate
            if let Err(e) = model.train(&fit.table) {
                warn!(candidate = i, error = %e, "candidate failed");
                last_error = Some(e);
                continue;
            }
            let predictions = model.predict(&holdout.table)?;
            let mse = Metrics::mse(&truth, &predictions);
            let elapsed_ms = t0.elapsed().as_millis() as u64;
            debug!(candidate = i, mse, elapsed_ms, "candidate scored");
            leaderboard.push(CandidateScore {
                config,
                holdout_mse: mse,
                elapsed_ms,
            });
            if best.as_ref().is_none_or(|(b, _)| mse < *b) {
                best = Some((mse, model));
            }
        }

        let Some((mse, model)) = best else {
            return Err(last_error.unwrap_or_else(|| {
                PipelineError::ModelState("no candidate could be trained".to_string())
            }));
        };
        info!(
            holdout_mse = mse,
            evaluated = leaderboard.len(),
            elapsed_s = started.elapsed().as_secs_f64(),
            "model search finished"
        );
        self.best = Some(model);
        self.leaderboard = leaderboard;
        Ok(())
    }

    fn predict(&self, data: &Table) -> Result<Vec<f64>> {
        self.best
            .as_ref()
            .ok_or_else(|| PipelineError::ModelState(format!("{} has not been trained", self.name)))?
            .predict(data)
    }

    fn info(&self) -> serde_json::Value {
        json!({
            "preset": self.preset,
            "time_limit_s": self.time_limit.as_secs_f64(),
            "seed": self.seed,
            "leaderboard": self.leaderboard,
            "best": self.best.as_ref().map(|m| m.info()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn flights(n: usize) -> Table {
        let distance: Vec<f64> = (0..n).map(|i| (i % 13) as f64 * 50.0).collect();
        let tow: Vec<f64> = distance.iter().map(|d| 60000.0 + 30.0 * d).collect();
        Table::from_columns(vec![
            Column::str("flight_id", (0..n).map(|i| Some(format!("f{}", i))).collect()),
            Column::from_f64s("flown_distance", &distance),
            Column::from_f64s("tow", &tow),
        ])
        .unwrap()
    }

    #[test]
    fn test_search_keeps_best_candidate() {
        let mut model = AutoMlModel::new(Duration::from_secs(60), Preset::Medium);
        model.train(&flights(100)).unwrap();
        assert_eq!(model.leaderboard().len(), Preset::Medium.candidates().len());
        let best = model
            .leaderboard()
            .iter()
            .map(|c| c.holdout_mse)
            .fold(f64::INFINITY, f64::min);
        let info = model.info();
        assert_eq!(info["preset"], "medium");
        assert!(best.is_finite());
        assert_eq!(model.predict(&flights(7)).unwrap().len(), 7);
    }

    #[test]
    fn test_zero_budget_still_trains_first_candidate() {
        let mut model = AutoMlModel::new(Duration::ZERO, Preset::Best);
        model.train(&flights(30)).unwrap();
        assert_eq!(model.leaderboard().len(), 1);
        assert_eq!(model.best_config(), Preset::Best.candidates().first());
        assert_eq!(model.predict(&flights(3)).unwrap().len(), 3);
    }

    #[test]
    fn test_predict_before_train() {
        let model = AutoMlModel::default();
        assert_eq!(model.time_limit(), DEFAULT_TIME_LIMIT);
        assert!(matches!(
            model.predict(&flights(2)),
            Err(PipelineError::ModelState(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = AutoMlModel::new(Duration::from_secs(30), Preset::Medium);
        assert!(model.save(dir.path()).is_err());
        model.train(&flights(40)).unwrap();

        let run = model.save(dir.path()).unwrap();
        let dir_name = run.file_name().unwrap().to_string_lossy().into_owned();
        assert!(dir_name.starts_with("ag-"));
        assert_eq!(dir_name.len(), "ag-YYYYMMDD_HHMMSS".len());
        assert!(run.join(PREDICTOR_FILE).exists());

        let loaded = AutoMlModel::load(&run).unwrap();
        assert_eq!(loaded.leaderboard(), model.leaderboard());
        assert_eq!(loaded.predict(&flights(5)).unwrap(), model.predict(&flights(5)).unwrap());
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("best_quality".parse::<Preset>().unwrap(), Preset::Best);
        assert_eq!("Medium".parse::<Preset>().unwrap(), Preset::Medium);
        assert!("extreme".parse::<Preset>().is_err());
        assert!(Preset::Medium.candidates().len() < Preset::Best.candidates().len());
    }
}
