//! Train a roster of models on one split and score them on the other.

use crate::utils::time_fn;
use atow::config::PipelineConfig;
use atow::dataset::{Dataset, TARGET};
use atow::error::Result;
use atow::evaluation::{win_rate, Evaluator, RegressionReport};
use atow::model::{
    AutoMlModel, AverageModel, EnsembleModel, LinearRegressor, LinearRegressorConfig, MedianModel,
    Model, SupervisedModel,
};
use std::collections::BTreeMap;
use tracing::info;

/// Scores of one model on the test partition.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub name: String,
    pub report: RegressionReport,
    pub predictions: Vec<f64>,
    pub train_ms: f64,
    pub info: serde_json::Value,
}

/// Baselines, the linear estimator, the AutoML search and an ensemble of the
/// two baselines.
pub fn default_models(config: &PipelineConfig) -> Result<Vec<Box<dyn Model>>> {
    let linear = SupervisedModel::new(LinearRegressor::new(LinearRegressorConfig::default()))
        .with_round_to(config.model.round_to);
    let automl = AutoMlModel::new(config.model.time_limit(), config.model.preset)
        .with_seed(config.split.seed);
    let ensemble = EnsembleModel::new(vec![Box::new(AverageModel::new()), Box::new(MedianModel::new())])?;
    let models: Vec<Box<dyn Model>> = vec![
        Box::new(AverageModel::new()),
        Box::new(MedianModel::new()),
        Box::new(linear),
        Box::new(automl),
        Box::new(ensemble),
    ];
    Ok(models)
}

/// Trains every model on `train` and evaluates it on `test`.
pub fn evaluate_models(
    models: &mut [Box<dyn Model>],
    train: &Dataset,
    test: &Dataset,
    evaluator: &Evaluator,
) -> Result<Vec<ModelOutcome>> {
    let truth = test.table.dense_f64(TARGET)?;
    let mut outcomes = Vec::with_capacity(models.len());
    for model in models.iter_mut() {
        info!(model = %model.name(), rows = train.len(), "training model");
        let (trained, elapsed) = time_fn(|| model.train(&train.table));
        trained?;
        let predictions = model.predict(&test.table)?;
        let report = evaluator.evaluate(&truth, &predictions)?;
        outcomes.push(ModelOutcome {
            name: model.name(),
            report,
            predictions,
            train_ms: elapsed.as_secs_f64() * 1000.0,
            info: model.info(),
        });
    }
    Ok(outcomes)
}

/// Win rate of each outcome against the others on `test`.
pub fn compare(outcomes: &[ModelOutcome], test: &Dataset) -> Result<BTreeMap<String, f64>> {
    let truth = test.table.dense_f64(TARGET)?;
    let entries: Vec<(String, Vec<f64>)> = outcomes
        .iter()
        .map(|o| (o.name.clone(), o.predictions.clone()))
        .collect();
    win_rate(&truth, &entries)
}

/// Prints one metrics table with a column per model.
pub fn print_comparison(outcomes: &[ModelOutcome], win_rates: &BTreeMap<String, f64>) {
    print!("{:<20}", "");
    for o in outcomes {
        print!("{:>22}", o.name);
    }
    println!();
    let rows = outcomes.first().map(|o| o.report.named().len()).unwrap_or(0);
    for i in 0..rows {
        let name = outcomes[0].report.named()[i].0;
        print!("{:<20}", name);
        for o in outcomes {
            print!("{:>22.3}", o.report.named()[i].1);
        }
        println!();
    }
    print!("{:<20}", "win_rate");
    for o in outcomes {
        print!("{:>22.3}", win_rates.get(&o.name).copied().unwrap_or(0.0));
    }
    println!();
    print!("{:<20}", "train_ms");
    for o in outcomes {
        print!("{:>22.1}", o.train_ms);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::synthetic_flights;

    #[test]
    fn test_roster_runs_on_synthetic_split() {
        let mut config = PipelineConfig::default();
        config.model.time_limit_secs = 1;
        config.model.preset = atow::model::Preset::Medium;
        let (train, test) = synthetic_flights(200, 1).unwrap().split(0.8, 0).unwrap();

        let mut models = default_models(&config).unwrap();
        let outcomes = evaluate_models(&mut models, &train, &test, &Evaluator::default()).unwrap();
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[4].name, "Ens([AverageModel, MedianModel])");

        let rates = compare(&outcomes, &test).unwrap();
        assert!((rates.values().sum::<f64>() - 1.0).abs() < 1e-9);

        // the linear model sees distance and aircraft type, the baselines do not
        assert!(outcomes[2].report.mse < outcomes[0].report.mse);
    }
}
