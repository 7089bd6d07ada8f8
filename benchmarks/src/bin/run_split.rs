//! Preprocess the training set, split it once, train the model roster and
//! compare the models on the held-out partition.
//!
//! Usage: `run_split [config.json]`

use atow::config::PipelineConfig;
use atow::dataset::{Dataset, FLIGHT_ID};
use atow::error::Result;
use atow::evaluation::Evaluator;
use atow::table::io::write_predictions;
use atow::telemetry::init_logging;
use benchmarks::{compare, default_models, evaluate_models, print_comparison};
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
    info!(rows = dataset.len(), name = %dataset.name, "loaded training data");

    let dataset = config.build_runner()?.run(dataset)?;
    let (train, test) = dataset.split(config.split.train_percent, config.split.seed)?;
    info!(train = train.len(), test = test.len(), "split dataset");

    let mut models = default_models(config)?;
    let outcomes = evaluate_models(&mut models, &train, &test, &Evaluator::detailed())?;
    let win_rates = compare(&outcomes, &test)?;
    print_comparison(&outcomes, &win_rates);

    std::fs::create_dir_all(&config.paths.output_dir)?;
    let ids = test.table.column(FLIGHT_ID)?;
    for outcome in &outcomes {
        let path = config
            .paths
            .output_dir
            .join(format!("predictions_{}.csv", outcome.name.replace(|c: char| !c.is_alphanumeric(), "_")));
        write_predictions(&path, ids, &outcome.predictions)?;
        info!(model = %outcome.name, path = %path.display(), "wrote predictions");
    }
    let infos: serde_json::Map<String, serde_json::Value> = outcomes
        .iter()
        .map(|o| (o.name.clone(), o.info.clone()))
        .collect();
    std::fs::write(
        config.paths.output_dir.join("model_info.json"),
        serde_json::to_string_pretty(&infos)?,
    )?;
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
