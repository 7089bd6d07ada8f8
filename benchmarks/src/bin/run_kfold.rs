//! Preprocess the training set and cross-validate the AutoML search over
//! k folds, reporting per-fold and mean metrics.
//!
//! Usage: `run_kfold [config.json]`

use atow::config::PipelineConfig;
use atow::dataset::{Dataset, TARGET};
use atow::error::Result;
use atow::evaluation::{Evaluator, RegressionReport};
use atow::model::{AutoMlModel, Model};
use atow::telemetry::init_logging;
use benchmarks::{time_fn, BenchmarkStats};
use std::process::ExitCode;
use tracing::{error, info};

fn load_config() -> Result<PipelineConfig> {
    match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn run(config: &PipelineConfig) -> Result<()> {
    let dataset = Dataset::load_csv(&config.paths.training)?;
    let dataset = config.build_runner()?.run(dataset)?;
    let folds = dataset.k_fold_split(config.split.k_folds, config.split.seed)?;

    let evaluator = Evaluator::detailed();
    let mut reports = Vec::with_capacity(folds.len());
    let mut fold_times = Vec::with_capacity(folds.len());
    for (i, (train, test)) in folds.iter().enumerate() {
        let mut model = AutoMlModel::new(config.model.time_limit(), config.model.preset)
            .with_seed(config.split.seed);
        info!(fold = i + 1, folds = folds.len(), train = train.len(), test = test.len(), "training fold");
        let (trained, elapsed) = time_fn(|| model.train(&train.table));
        trained?;
        fold_times.push(elapsed.as_secs_f64() * 1000.0);

        let predictions = model.predict(&test.table)?;
        let report = evaluator.evaluate(&test.table.dense_f64(TARGET)?, &predictions)?;
        println!("fold {}/{}\n{}", i + 1, folds.len(), report);
        if i + 1 == folds.len() {
            let saved = model.save(&config.paths.output_dir)?;
            info!(path = %saved.display(), "saved last fold predictor");
        }
        reports.push(report);
    }

    if let Some(mean) = RegressionReport::mean_of(&reports) {
        println!("mean over {} folds\n{}", reports.len(), mean);
    }
    if let Some(stats) = BenchmarkStats::from_times(fold_times) {
        println!("training time per fold: {}", stats);
    }
    Ok(())
}

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging.level, config.logging.json) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, root_cause = %e.root_cause(), "run failed");
            ExitCode::FAILURE
        }
    }
}
