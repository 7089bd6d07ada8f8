//! Scoring predictions against the ground truth.
//!
//! [`Evaluator`] turns one prediction vector into a [`RegressionReport`];
//! [`win_rate`] compares several models row by row.

pub mod compare;
pub mod metrics;

pub use compare::win_rate;
pub use metrics::{
    Evaluator, Metrics, RegressionReport, DEFAULT_EPSILON, DEFAULT_NEAR_TOLERANCE,
    SIMPLE_NEAR_TOLERANCE,
};
