//! Regression metrics over a ground-truth vector and one prediction vector.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Default relative tolerance for `percent_near`.
pub const DEFAULT_NEAR_TOLERANCE: f64 = 0.10;

/// Tolerance used by [`Evaluator::simple`].
pub const SIMPLE_NEAR_TOLERANCE: f64 = 0.05;

/// Added to the ground truth in relative-error denominators.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Scalar metric functions. Inputs are assumed validated and non-empty.
pub struct Metrics;

impl Metrics {
    /// MSE = mean((y_true - y_pred)^2)
    pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
        mean(y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)))
    }

    /// RMSE = sqrt(MSE), in target units.
    pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
        Self::mse(y_true, y_pred).sqrt()
    }

    /// MAE = mean(|y_true - y_pred|)
    pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
        mean(abs_errors(y_true, y_pred))
    }

    /// Population standard deviation of the absolute errors.
    pub fn mae_stddev(y_true: &[f64], y_pred: &[f64]) -> f64 {
        let mae = Self::mae(y_true, y_pred);
        mean(abs_errors(y_true, y_pred).map(|e| (e - mae).powi(2))).sqrt()
    }

    pub fn max_abs_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
        abs_errors(y_true, y_pred).fold(f64::NEG_INFINITY, f64::max)
    }

    /// MAPE in percent. The denominator is `|y_true| + eps`, so a zero
    /// ground truth gives a large but finite value.
    pub fn mape(y_true: &[f64], y_pred: &[f64], eps: f64) -> f64 {
        100.0 * mean(relative_errors(y_true, y_pred, eps))
    }

    /// Coefficient of determination.
    ///
    /// With a constant ground truth the total variance is zero; the score is
    /// then 1.0 for a perfect prediction and 0.0 otherwise.
    pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
        let mean_true = mean(y_true.iter().copied());
        let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean_true).powi(2)).sum();
        if ss_tot == 0.0 {
            return if ss_res == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - ss_res / ss_tot
    }

    /// Percentage of rows whose relative error is within `tolerance`.
    pub fn percent_near(y_true: &[f64], y_pred: &[f64], tolerance: f64, eps: f64) -> f64 {
        let near = relative_errors(y_true, y_pred, eps).filter(|r| *r <= tolerance).count();
        100.0 * near as f64 / y_true.len() as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}

fn abs_errors<'a>(y_true: &'a [f64], y_pred: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs())
}

fn relative_errors<'a>(
    y_true: &'a [f64],
    y_pred: &'a [f64],
    eps: f64,
) -> impl Iterator<Item = f64> + 'a {
    y_true.iter().zip(y_pred).map(move |(t, p)| (t - p).abs() / (t.abs() + eps))
}

/// The full set of metrics for one model on one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub rmse: f64,
    pub mape: f64,
    pub mae: f64,
    pub mse: f64,
    pub mae_stddev: f64,
    pub max_abs_error: f64,
    pub mean_relative_error: f64,
    pub max_relative_error: f64,
    pub r_squared: f64,
    pub percent_near: f64,
}

impl RegressionReport {
    /// Metric names and values in display order.
    pub fn named(&self) -> [(&'static str, f64); 10] {
        [
            ("rmse", self.rmse),
            ("mape", self.mape),
            ("mae", self.mae),
            ("mse", self.mse),
            ("mae_stddev", self.mae_stddev),
            ("max_abs_error", self.max_abs_error),
            ("mean_relative_error", self.mean_relative_error),
            ("max_relative_error", self.max_relative_error),
            ("r_squared", self.r_squared),
            ("percent_near", self.percent_near),
        ]
    }

    /// Element-wise mean over several reports, e.g. across k folds.
    pub fn mean_of(reports: &[RegressionReport]) -> Option<RegressionReport> {
        if reports.is_empty() {
            return None;
        }
        let n = reports.len() as f64;
        let avg = |f: fn(&RegressionReport) -> f64| reports.iter().map(f).sum::<f64>() / n;
        Some(RegressionReport {
            rmse: avg(|r| r.rmse),
            mape: avg(|r| r.mape),
            mae: avg(|r| r.mae),
            mse: avg(|r| r.mse),
            mae_stddev: avg(|r| r.mae_stddev),
            max_abs_error: avg(|r| r.max_abs_error),
            mean_relative_error: avg(|r| r.mean_relative_error),
            max_relative_error: avg(|r| r.max_relative_error),
            r_squared: avg(|r| r.r_squared),
            percent_near: avg(|r| r.percent_near),
        })
    }
}

impl std::fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in self.named() {
            writeln!(f, "{:<20}: {:.3}", name, value)?;
        }
        Ok(())
    }
}

/// Stateless metric calculator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluator {
    pub near_tolerance: f64,
    pub epsilon: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::detailed()
    }
}

impl Evaluator {
    /// 10% tolerance for `percent_near`.
    pub fn detailed() -> Self {
        Self {
            near_tolerance: DEFAULT_NEAR_TOLERANCE,
            epsilon: DEFAULT_EPSILON,
        }
    }

    /// 5% tolerance for `percent_near`.
    pub fn simple() -> Self {
        Self {
            near_tolerance: SIMPLE_NEAR_TOLERANCE,
            ..Self::detailed()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.near_tolerance = tolerance;
        self
    }

    /// # Errors
    /// `InvalidArgument` when the inputs are empty or differ in length.
    pub fn evaluate(&self, ground_truth: &[f64], predictions: &[f64]) -> Result<RegressionReport> {
        check_lengths(ground_truth, predictions)?;
        let (gt, pred) = (ground_truth, predictions);
        let relative: Vec<f64> = relative_errors(gt, pred, self.epsilon).collect();
        Ok(RegressionReport {
            rmse: Metrics::rmse(gt, pred),
            mape: Metrics::mape(gt, pred, self.epsilon),
            mae: Metrics::mae(gt, pred),
            mse: Metrics::mse(gt, pred),
            mae_stddev: Metrics::mae_stddev(gt, pred),
            max_abs_error: Metrics::max_abs_error(gt, pred),
            mean_relative_error: mean(relative.iter().copied()),
            max_relative_error: relative.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            r_squared: Metrics::r_squared(gt, pred),
            percent_near: Metrics::percent_near(gt, pred, self.near_tolerance, self.epsilon),
        })
    }
}

pub(crate) fn check_lengths(ground_truth: &[f64], predictions: &[f64]) -> Result<()> {
    if ground_truth.is_empty() {
        return Err(PipelineError::InvalidArgument("ground truth is empty".to_string()));
    }
    if ground_truth.len() != predictions.len() {
        return Err(PipelineError::InvalidArgument(format!(
            "{} ground-truth values but {} predictions",
            ground_truth.len(),
            predictions.len()
        )));
    }
    Ok(())
}
