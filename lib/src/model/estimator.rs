//! Supervised estimators behind the [`Model`] interface.
//!
//! A [`Regressor`] works on dense matrices. [`SupervisedModel`] wraps one and
//! does the table handling: column dropping, train-time feature encoding, an
//! internal holdout for diagnostics and optional rounding of the output.

use super::encoding::FeatureEncoder;
use super::linear::{LinearModel, LinearRegression, SerializableLinearParams};
use super::{Fitted, Model};
use crate::dataset::{FLIGHT_ID, TARGET};
use crate::error::{PipelineError, Result};
use crate::evaluation::Metrics;
use crate::loss::{Loss, MAELoss, MSELoss};
use crate::optimizer::SGD;
use crate::regularizers::Penalty;
use crate::table::Table;
use crate::trainer::{TrainReport, Trainer};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info};

/// An estimator over a dense feature matrix.
pub trait Regressor: Send + Sync {
    fn name(&self) -> String;

    /// Hyperparameters as JSON.
    fn params(&self) -> serde_json::Value;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// # Errors
    /// `ModelState` before `fit`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Learned parameters, or `null` before `fit`.
    fn describe(&self) -> serde_json::Value;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Mse,
    Mae,
}

/// Hyperparameters of [`LinearRegressor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearRegressorConfig {
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub loss: LossKind,
    pub penalty: Penalty,
}

impl Default for LinearRegressorConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 64,
            loss: LossKind::Mse,
            penalty: Penalty::None,
        }
    }
}

/// Per-column shift and scale applied before training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Standardization {
    x_mean: Vec<f64>,
    x_std: Vec<f64>,
    y_mean: f64,
    y_std: f64,
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count().max(1) as f64;
    let mean = values.clone().sum::<f64>() / n;
    let std = (values.map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    // constant columns are only shifted
    (mean, if std > 0.0 { std } else { 1.0 })
}

impl Standardization {
    fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Self {
        let (x_mean, x_std) = x
            .axis_iter(Axis(1))
            .map(|col| mean_std(col.iter().copied()))
            .unzip();
        let (y_mean, y_std) = mean_std(y.iter().copied());
        Self {
            x_mean,
            x_std,
            y_mean,
            y_std,
        }
    }

    fn scale_x(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut scaled = x.clone();
        for (j, mut col) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| (v - self.x_mean[j]) / self.x_std[j]);
        }
        scaled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedLinear {
    params: SerializableLinearParams,
    scaling: Standardization,
    report: TrainReport,
}

/// Linear regression on standardized features and target, trained by
/// mini-batch gradient descent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegressor {
    config: LinearRegressorConfig,
    #[serde(skip)]
    deadline: Option<Instant>,
    fitted: Option<FittedLinear>,
}

impl LinearRegressor {
    pub fn new(config: LinearRegressorConfig) -> Self {
        Self {
            config,
            deadline: None,
            fitted: None,
        }
    }

    /// Advisory wall-clock limit forwarded to the trainer.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn config(&self) -> &LinearRegressorConfig {
        &self.config
    }

    pub fn train_report(&self) -> Option<&TrainReport> {
        self.fitted.as_ref().map(|f| &f.report)
    }

    fn train_with<L: Loss>(
        &self,
        loss: L,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<(LinearModel<Fitted>, TrainReport)> {
        let trainer = Trainer::<L, SGD, LinearRegression, Penalty>::builder(
            loss,
            SGD::new(self.config.learning_rate),
            self.config.penalty,
        )
        .batch_size(self.config.batch_size)
        .max_epochs(self.config.max_epochs)
        .deadline(self.deadline)
        .verbose(false)
        .build();
        trainer.fit(LinearRegression::new(x.ncols()), x, y)
    }
}

impl Regressor for LinearRegressor {
    fn name(&self) -> String {
        "LinearRegressor".to_string()
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(self.config).unwrap_or(serde_json::Value::Null)
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let scaling = Standardization::fit(x, y);
        let xs = scaling.scale_x(x);
        let ys = y.mapv(|v| (v - scaling.y_mean) / scaling.y_std);
        let (model, report) = match self.config.loss {
            LossKind::Mse => self.train_with(MSELoss, &xs, &ys)?,
            LossKind::Mae => self.train_with(MAELoss, &xs, &ys)?,
        };
        debug!(epochs = report.epochs, loss = report.final_loss, "linear regressor fitted");
        self.fitted = Some(FittedLinear {
            params: model.extract_params(),
            scaling,
            report,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| PipelineError::ModelState("regressor has not been fitted".to_string()))?;
        let model = LinearModel::<Fitted>::from_params(fitted.params.clone())?;
        let scaled = model.predict_batch(&fitted.scaling.scale_x(x))?;
        let s = &fitted.scaling;
        Ok(scaled.mapv(|v| v * s.y_std + s.y_mean))
    }

    /// Coefficients on the original feature scale.
    fn describe(&self) -> serde_json::Value {
        let Some(fitted) = &self.fitted else {
            return serde_json::Value::Null;
        };
        let s = &fitted.scaling;
        let weights: Vec<f64> = fitted
            .params
            .weights
            .iter()
            .zip(s.x_std.iter())
            .map(|(w, sd)| w * s.y_std / sd)
            .collect();
        let intercept = s.y_mean + s.y_std * fitted.params.bias
            - weights.iter().zip(&s.x_mean).map(|(w, m)| w * m).sum::<f64>();
        json!({
            "weights": weights,
            "intercept": intercept,
            "epochs": fitted.report.epochs,
            "final_loss": fitted.report.final_loss,
            "stopped_early": fitted.report.stopped_early,
        })
    }
}

/// Diagnostics recorded during [`SupervisedModel::train`].
///
/// The `test_*` values are `NaN` when the holdout is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainMetrics {
    pub train_mse: f64,
    pub test_mse: f64,
    pub train_r2: f64,
    pub test_r2: f64,
}

/// Column handling around a [`Regressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisedSettings {
    pub target: String,
    /// Identifier and free-text columns that are never features.
    pub drop_columns: Vec<String>,
    /// Fraction of training rows held out for `test_*` metrics.
    pub test_size: f64,
    pub seed: u64,
    /// Round predictions to this many decimal places.
    pub round_to: Option<u32>,
}

impl Default for SupervisedSettings {
    fn default() -> Self {
        Self {
            target: TARGET.to_string(),
            drop_columns: [FLIGHT_ID, "callsign", "name_adep", "name_ades"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            test_size: 0.2,
            seed: 42,
            round_to: None,
        }
    }
}

/// A [`Regressor`] trained on typed tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedModel<R> {
    regressor: R,
    settings: SupervisedSettings,
    encoder: Option<FeatureEncoder>,
    metrics: Option<TrainMetrics>,
}

impl<R: Regressor> SupervisedModel<R> {
    pub fn new(regressor: R) -> Self {
        Self::with_settings(regressor, SupervisedSettings::default())
    }

    pub fn with_settings(regressor: R, settings: SupervisedSettings) -> Self {
        Self {
            regressor,
            settings,
            encoder: None,
            metrics: None,
        }
    }

    pub fn with_round_to(mut self, decimals: Option<u32>) -> Self {
        self.settings.round_to = decimals;
        self
    }

    pub fn settings(&self) -> &SupervisedSettings {
        &self.settings
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    pub fn metrics(&self) -> Option<&TrainMetrics> {
        self.metrics.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.encoder.is_some()
    }

    fn excluded(&self) -> Vec<&str> {
        self.settings
            .drop_columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.settings.target.as_str()))
            .collect()
    }

    /// Rows `0..n` split into `(train, holdout)` by a seeded shuffle.
    fn holdout_split(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.settings.seed));
        let n_test = ((self.settings.test_size * n as f64).ceil() as usize).min(n.saturating_sub(1));
        let train = order.split_off(n_test);
        (train, order)
    }
}

fn scores(y: &Array1<f64>, predictions: &Array1<f64>) -> (f64, f64) {
    match (y.as_slice(), predictions.as_slice()) {
        (Some(t), Some(p)) if !t.is_empty() => (Metrics::mse(t, p), Metrics::r_squared(t, p)),
        _ => (f64::NAN, f64::NAN),
    }
}

impl<R: Regressor> Model for SupervisedModel<R> {
    fn name(&self) -> String {
        self.regressor.name()
    }

    fn train(&mut self, data: &Table) -> Result<()> {
        if !(0.0..1.0).contains(&self.settings.test_size) {
            return Err(PipelineError::InvalidArgument(format!(
                "test_size must be in [0, 1), got {}",
                self.settings.test_size
            )));
        }
        let target = data.column(&self.settings.target)?.to_f64()?;
        let labelled: Vec<bool> = target.iter().map(|v| v.is_some_and(f64::is_finite)).collect();
        let data = data.filter(&labelled)?;
        if data.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "no rows with a target value to train on".to_string(),
            ));
        }
        let y = Array1::from(data.dense_f64(&self.settings.target)?);

        let encoder = FeatureEncoder::fit(&data, &self.excluded())?;
        let x = encoder.transform(&data)?;
        let (train_rows, test_rows) = self.holdout_split(data.n_rows());

        let (x_train, y_train) = (x.select(Axis(0), &train_rows), y.select(Axis(0), &train_rows));
        let (x_test, y_test) = (x.select(Axis(0), &test_rows), y.select(Axis(0), &test_rows));

        info!(
            model = %self.regressor.name(),
            rows = train_rows.len(),
            holdout = test_rows.len(),
            features = encoder.n_features(),
            "training supervised model"
        );
        self.regressor.fit(&x_train, &y_train)?;

        let (train_mse, train_r2) = scores(&y_train, &self.regressor.predict(&x_train)?);
        let (test_mse, test_r2) = if test_rows.is_empty() {
            (f64::NAN, f64::NAN)
        } else {
            scores(&y_test, &self.regressor.predict(&x_test)?)
        };
        let metrics = TrainMetrics {
            train_mse,
            test_mse,
            train_r2,
            test_r2,
        };
        info!(train_mse, test_mse, train_r2, test_r2, "supervised model trained");

        self.encoder = Some(encoder);
        self.metrics = Some(metrics);
        Ok(())
    }

    fn predict(&self, data: &Table) -> Result<Vec<f64>> {
        let encoder = self
            .encoder
            .as_ref()
            .ok_or_else(|| PipelineError::ModelState(format!("{} has not been trained", self.name())))?;
        let x = encoder.transform(data)?;
        let predictions = self.regressor.predict(&x)?;
        Ok(match self.settings.round_to {
            Some(decimals) => {
                let factor = 10f64.powi(decimals as i32);
                predictions.iter().map(|p| (p * factor).round() / factor).collect()
            }
            None => predictions.to_vec(),
        })
    }

    fn info(&self) -> serde_json::Value {
        let Some(encoder) = &self.encoder else {
            return json!({ "status": "Model not trained" });
        };
        json!({
            "model_class": self.regressor.name(),
            "model_params": self.regressor.params(),
            "feature_columns": encoder.feature_names(),
            "metrics": self.metrics,
            "coefficients": self.regressor.describe(),
        })
    }
}
