//! Takeoff-weight models.
//!
//! Every model implements [`Model`]: it is trained on a table that contains the
//! target column and predicts one value per row of another table, in row order.
//!
//! The numeric building blocks used by the supervised models live here as well:
//! [`TrainableModel`] and [`ParamOps`] describe anything the gradient-descent
//! [`Trainer`](crate::trainer::Trainer) can fit, and the `Unfitted`/`Fitted`
//! markers keep training-only state out of fitted predictors.

use crate::error::Result;
use crate::table::Table;

pub mod automl;
pub mod baseline;
pub mod encoding;
pub mod ensemble;
pub mod estimator;
pub mod linear;

pub use automl::{AutoMlModel, CandidateScore, Preset, DEFAULT_TIME_LIMIT, PREDICTOR_FILE};
pub use baseline::{AverageModel, MedianModel};
pub use encoding::{FeatureEncoder, FittedOrdinalEncoder, HandleUnknown, OrdinalEncoder, UNKNOWN_CODE};
pub use ensemble::EnsembleModel;
pub use estimator::{
    LinearRegressor, LinearRegressorConfig, LossKind, Regressor, SupervisedModel, SupervisedSettings,
    TrainMetrics,
};
pub use linear::{LinearModel, LinearParams, LinearRegression, SerializableLinearParams};

/// A model of the target column.
pub trait Model: Send {
    /// Display name, used as the key in evaluation reports.
    fn name(&self) -> String;

    /// Fits the model. The table must contain the target column.
    fn train(&mut self, data: &Table) -> Result<()>;

    /// One prediction per row of `data`, in row order.
    ///
    /// # Errors
    /// [`ModelState`](crate::error::PipelineError::ModelState) before `train`.
    fn predict(&self, data: &Table) -> Result<Vec<f64>>;

    /// Learned parameters and training diagnostics.
    fn info(&self) -> serde_json::Value;
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn train(&mut self, data: &Table) -> Result<()> {
        (**self).train(data)
    }

    fn predict(&self, data: &Table) -> Result<Vec<f64>> {
        (**self).predict(data)
    }

    fn info(&self) -> serde_json::Value {
        (**self).info()
    }
}

/// Type-level marker: parameters are still being learned.
#[derive(Debug, Clone, Copy)]
pub struct Unfitted;

/// Type-level marker: inference only.
#[derive(Debug, Clone, Copy)]
pub struct Fitted;

/// A model the [`Trainer`](crate::trainer::Trainer) can fit by gradient descent.
pub trait TrainableModel {
    type Input;
    type Prediction;
    type Params;
    type Gradients;
    type Output;

    fn forward(&self, input: &Self::Input) -> Self::Prediction;
    fn backward(&self, input: &Self::Input, grad_output: &Self::Prediction) -> Self::Gradients;
    fn params(&self) -> &Self::Params;
    fn update_params(&mut self, new_params: &Self::Params);

    /// Drops training state and returns the inference model.
    fn into_fitted(self) -> Self::Output;
}

/// Arithmetic needed to apply gradient updates.
pub trait ParamOps: Clone {
    fn add(&self, other: &Self) -> Self;
    fn scale(&self, factor: f64) -> Self;
}
