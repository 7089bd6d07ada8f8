//! End-to-end checks across preprocessing, partitioning, models and evaluation.

use atow::dataset::{fold_sizes, Dataset};
use atow::error::{PipelineError, Result};
use atow::evaluation::{win_rate, Evaluator, Metrics};
use atow::model::{AverageModel, EnsembleModel, MedianModel, Model};
use atow::preprocessing::{
    DerivedFeaturePreprocessor, PipelineRunner, PreprocessingCache, Preprocessor, Stage,
    DEFAULT_BYTES_LIMIT,
};
use atow::table::io::{read_csv, write_predictions};
use atow::table::{Column, Table};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn flights(n: usize) -> Dataset {
    let ids: Vec<String> = (0..n).map(|i| format!("f{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let dates: Vec<String> = (0..n).map(|i| format!("2022-03-{:02}", i % 28 + 1)).collect();
    let date_refs: Vec<&str> = dates.iter().map(String::as_str).collect();
    let tow: Vec<f64> = (0..n).map(|i| 60_000.0 + i as f64 * 10.0).collect();
    let table = Table::from_columns(vec![
        Column::from_strs("flight_id", &id_refs),
        Column::from_strs("date", &date_refs),
        Column::from_f64s("tow", &tow),
    ])
    .unwrap();
    Dataset::new(table, "flights")
}

fn ids(dataset: &Dataset) -> Vec<String> {
    let column = dataset.table.column("flight_id").unwrap();
    (0..column.len()).filter_map(|row| column.key(row)).collect()
}

/// Counts calls so tests can tell a cache hit from a recomputation.
struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Preprocessor for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = dataset.len();
        dataset
            .table
            .insert_column(Column::from_f64s("doubled", &vec![2.0; n]))?;
        Ok(dataset)
    }
}

struct Failing;

impl Preprocessor for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn process(&self, dataset: Dataset) -> Result<Dataset> {
        dataset.table.column("no_such_column")?;
        Ok(dataset)
    }
}

#[test]
fn cached_and_uncached_runs_agree() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = PreprocessingCache::open(dir.path(), DEFAULT_BYTES_LIMIT).unwrap();
    let cached = PipelineRunner::new(Some(cache))
        .stage(Stage::new(Counting { calls: calls.clone() }))
        .stage(Stage::new(DerivedFeaturePreprocessor::new()));
    let uncached = PipelineRunner::new(None)
        .stage(Stage::new(Counting { calls: Arc::new(AtomicUsize::new(0)) }))
        .stage(Stage::new(DerivedFeaturePreprocessor::new()));

    let expected = uncached.run(flights(20)).unwrap();
    let first = cached.run(flights(20)).unwrap();
    let second = cached.run(flights(20)).unwrap();

    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cached.cache().unwrap().stats().hits >= 2);
}

#[test]
fn opted_out_stage_always_runs() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = PreprocessingCache::open(dir.path(), DEFAULT_BYTES_LIMIT).unwrap();
    let runner = PipelineRunner::new(Some(cache))
        .stage(Stage::new(Counting { calls: calls.clone() }).no_cache());

    runner.run(flights(5)).unwrap();
    runner.run(flights(5)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(runner.cache().unwrap().is_empty());
}

#[test]
fn cache_entries_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let cache = PreprocessingCache::open(dir.path(), DEFAULT_BYTES_LIMIT).unwrap();
        PipelineRunner::new(Some(cache))
            .stage(Stage::new(Counting { calls: calls.clone() }))
            .run(flights(8))
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stage_failure_names_the_stage() {
    let runner = PipelineRunner::new(None)
        .stage(Stage::new(DerivedFeaturePreprocessor::new()))
        .stage(Stage::new(Failing));

    let err = runner.run(flights(3)).unwrap_err();
    match &err {
        PipelineError::StageFailed { stage, .. } => assert_eq!(stage, "failing"),
        other => panic!("expected StageFailed, got {:?}", other),
    }
    assert!(matches!(
        err.root_cause(),
        PipelineError::MissingColumn { column } if column == "no_such_column"
    ));
}

#[test]
fn average_of_ten_twenty_thirty() {
    let train = Table::from_columns(vec![Column::from_f64s("tow", &[10.0, 20.0, 30.0])]).unwrap();
    let test = Table::from_columns(vec![Column::from_f64s("x", &[1.0, 2.0])]).unwrap();

    let mut model = AverageModel::new();
    model.train(&train).unwrap();
    assert_eq!(model.predict(&test).unwrap(), vec![20.0, 20.0]);
}

#[test]
fn ensemble_averages_members() {
    let train = Table::from_columns(vec![Column::from_f64s("tow", &[10.0, 20.0, 60.0])]).unwrap();
    let mut ensemble = EnsembleModel::new(vec![
        Box::new(AverageModel::new()),
        Box::new(MedianModel::new()),
    ])
    .unwrap();
    ensemble.train(&train).unwrap();

    // mean 30, median 20
    let predictions = ensemble.predict(&train).unwrap();
    assert_eq!(predictions, vec![25.0, 25.0, 25.0]);
    assert_eq!(ensemble.name(), "Ens([AverageModel, MedianModel])");
}

#[test]
fn equal_mae_models_split_by_row() {
    let truth = [100.0, 200.0, 300.0];
    let m1 = vec![110.0, 190.0, 305.0];
    let m2 = vec![90.0, 210.0, 295.0];

    let mae1 = Metrics::mae(&truth, &m1);
    let mae2 = Metrics::mae(&truth, &m2);
    assert!((mae1 - 25.0 / 3.0).abs() < 1e-12);
    assert_eq!(mae1, mae2);

    // every row is a tie, so the first model takes all of them
    let rates = win_rate(&truth, &[("m1".to_string(), m1), ("m2".to_string(), m2)]).unwrap();
    assert_eq!(rates["m1"], 1.0);
    assert_eq!(rates["m2"], 0.0);
}

#[test]
fn evaluation_report_for_trained_baseline() {
    let (train, test) = flights(50).split(0.8, 3).unwrap();
    let mut model = MedianModel::new();
    model.train(&train.table).unwrap();
    let predictions = model.predict(&test.table).unwrap();

    let truth = test.table.dense_f64("tow").unwrap();
    let report = Evaluator::detailed().evaluate(&truth, &predictions).unwrap();
    assert_eq!(report.rmse, report.mse.sqrt());
    assert!(report.max_abs_error >= report.mae);
    assert!((0.0..=100.0).contains(&report.percent_near));
}

#[test]
fn predictions_file_has_one_row_per_flight() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.csv");
    let dataset = flights(4);
    let ids_column = dataset.table.column("flight_id").unwrap();
    write_predictions(&path, ids_column, &[1.0, 2.0, 3.5, 4.0]).unwrap();

    let written = read_csv(&path).unwrap();
    assert_eq!(written.column_names(), vec!["flight_id", "tow"]);
    assert_eq!(written.n_rows(), 4);
    assert_eq!(written.column("tow").unwrap().to_f64().unwrap()[2], Some(3.5));

    assert!(write_predictions(&path, ids_column, &[1.0]).is_err());
}

proptest! {
    #[test]
    fn split_partitions_rows(n in 2usize..300, percent in 0.05f64..0.95, seed in any::<u64>()) {
        let dataset = flights(n);
        let (train, test) = dataset.split(percent, seed).unwrap();
        prop_assert_eq!(train.len() + test.len(), n);

        let train_ids: HashSet<String> = ids(&train).into_iter().collect();
        let test_ids: HashSet<String> = ids(&test).into_iter().collect();
        prop_assert!(train_ids.is_disjoint(&test_ids));
        prop_assert_eq!(train_ids.len() + test_ids.len(), n);
    }

    #[test]
    fn split_is_deterministic(n in 2usize..200, seed in any::<u64>()) {
        let dataset = flights(n);
        let a = dataset.split(0.8, seed).unwrap();
        let b = dataset.split(0.8, seed).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn k_fold_test_sets_cover_every_row_once(n in 10usize..200, k in 2usize..10) {
        let dataset = flights(n);
        let folds = dataset.k_fold_split(k, 0).unwrap();
        prop_assert_eq!(folds.len(), k);

        let mut seen = Vec::new();
        for ((train, test), size) in folds.iter().zip(fold_sizes(n, k)) {
            prop_assert_eq!(test.len(), size);
            prop_assert_eq!(train.len() + test.len(), n);
            seen.extend(ids(test));
        }
        let unique: HashSet<&String> = seen.iter().collect();
        prop_assert_eq!(seen.len(), n);
        prop_assert_eq!(unique.len(), n);
    }

    #[test]
    fn win_rates_sum_to_one(
        rows in prop::collection::vec((-1e6f64..1e6, -1e6f64..1e6, -1e6f64..1e6), 1..50)
    ) {
        let truth: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let a: Vec<f64> = rows.iter().map(|r| r.1).collect();
        let b: Vec<f64> = rows.iter().map(|r| r.2).collect();
        let rates = win_rate(&truth, &[("a".to_string(), a), ("b".to_string(), b)]).unwrap();
        prop_assert!((rates.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
