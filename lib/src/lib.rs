//! # atow
//!
//! Feature engineering, model training and evaluation for aircraft takeoff
//! weight (TOW) prediction from flight-plan records.
//!
//! A run loads a [`Dataset`](dataset::Dataset) of flights, passes it through an
//! ordered, disk-cached chain of preprocessing stages, splits it into train and
//! test partitions (or k folds), trains one or more [`Model`](model::Model)s and
//! scores their predictions.
//!
//! ## Quick Start
//!
//! ```rust
//! use atow::dataset::Dataset;
//! use atow::evaluation::Evaluator;
//! use atow::model::{AverageModel, Model};
//! use atow::table::{Column, Table};
//!
//! let table = Table::from_columns(vec![
//!     Column::from_strs("flight_id", &["a", "b", "c", "d", "e"]),
//!     Column::from_f64s("tow", &[60000.0, 62000.0, 58000.0, 61000.0, 59000.0]),
//! ])
//! .unwrap();
//! let (train, test) = Dataset::new(table, "flights").split(0.8, 0).unwrap();
//!
//! let mut model = AverageModel::new();
//! model.train(&train.table).unwrap();
//! let predictions = model.predict(&test.table).unwrap();
//!
//! let truth = test.table.dense_f64("tow").unwrap();
//! let report = Evaluator::detailed().evaluate(&truth, &predictions).unwrap();
//! assert!(report.mae >= 0.0);
//! ```
//!
//! ## Module Structure
//!
//! - `table`: typed columnar tables and CSV I/O
//! - `dataset`: named tables, train/test split and k-fold partitioning
//! - `preprocessing`: stages, the pipeline runner and its disk cache
//! - `model`: baseline, supervised, AutoML and ensemble models
//! - `loss`, `optimizer`, `regularizers`, `trainer`: the gradient-descent core
//! - `evaluation`: regression metrics and head-to-head win rates
//! - `config`, `telemetry`: run configuration and log setup

/// Run configuration.
pub mod config;

/// Named datasets and partitioning.
pub mod dataset;

pub mod error;

/// Regression metrics and model comparison.
pub mod evaluation;

/// Differentiable loss functions for model training.
pub mod loss;

/// Takeoff-weight models.
pub mod model;

/// Optimization algorithms for parameter updates.
pub mod optimizer;

/// Preprocessing stages, pipeline runner and cache.
pub mod preprocessing;

/// Weight regularization strategies to prevent overfitting.
pub mod regularizers;

/// Typed columnar tables.
pub mod table;

pub mod telemetry;

/// Mini-batch training loop.
pub mod trainer;

pub use error::{PipelineError, Result};
