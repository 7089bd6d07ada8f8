//! Experiment drivers and benchmark helpers for the atow pipeline.
//!
//! - `experiment`: train a model roster on a split and score it
//! - `synthetic`: reproducible fake flight tables for benches and smoke runs
//! - `utils`: timing helpers

pub mod experiment;
pub mod synthetic;
pub mod utils;

pub use experiment::{compare, default_models, evaluate_models, print_comparison, ModelOutcome};
pub use synthetic::synthetic_flights;
pub use utils::{time_fn, BenchmarkStats, Timer};
