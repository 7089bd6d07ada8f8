//! Linear model `y = X·w + b` with its training state encoded in the type.
//!
//! [`LinearRegression`] (`LinearModel<Unfitted>`) implements [`TrainableModel`];
//! `LinearModel<Fitted>` only predicts and converts to and from
//! [`SerializableLinearParams`].

use super::{Fitted, ParamOps, TrainableModel, Unfitted};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Weights and bias of a linear model.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearParams {
    pub weights: Array1<f64>,
    pub bias: f64,
}

impl LinearParams {
    pub fn zeros(n_features: usize) -> Self {
        Self {
            weights: Array1::zeros(n_features),
            bias: 0.0,
        }
    }
}

impl ParamOps for LinearParams {
    fn add(&self, other: &Self) -> Self {
        Self {
            weights: &self.weights + &other.weights,
            bias: self.bias + other.bias,
        }
    }

    fn scale(&self, factor: f64) -> Self {
        Self {
            weights: &self.weights * factor,
            bias: self.bias * factor,
        }
    }
}

/// Plain-vector form of [`LinearParams`] for persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializableLinearParams {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl From<&LinearParams> for SerializableLinearParams {
    fn from(params: &LinearParams) -> Self {
        Self {
            weights: params.weights.to_vec(),
            bias: params.bias,
        }
    }
}

impl TryFrom<SerializableLinearParams> for LinearParams {
    type Error = PipelineError;

    fn try_from(value: SerializableLinearParams) -> Result<Self> {
        if !value.bias.is_finite() || value.weights.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::Serialization(
                "linear parameters contain non-finite values".to_string(),
            ));
        }
        Ok(Self {
            weights: Array1::from(value.weights),
            bias: value.bias,
        })
    }
}

pub struct LinearModel<S> {
    params: LinearParams,
    _state: PhantomData<S>,
}

impl<S> std::fmt::Debug for LinearModel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearModel")
            .field("params", &self.params)
            .finish()
    }
}

impl<S> Clone for LinearModel<S> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            _state: PhantomData,
        }
    }
}

/// A linear model being trained.
pub type LinearRegression = LinearModel<Unfitted>;

impl LinearRegression {
    /// Zero-initialized model over `n_features` inputs.
    pub fn new(n_features: usize) -> Self {
        Self::from_params(LinearParams::zeros(n_features))
    }

    /// Warm start from explicit parameters.
    pub fn from_params(params: LinearParams) -> Self {
        Self {
            params,
            _state: PhantomData,
        }
    }
}

impl TrainableModel for LinearRegression {
    type Input = Array2<f64>;
    type Prediction = Array1<f64>;
    type Params = LinearParams;
    type Gradients = LinearParams;
    type Output = LinearModel<Fitted>;

    fn forward(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.params.weights) + self.params.bias
    }

    /// `∇w = Xᵀ · grad`, `∇b = Σ grad`.
    fn backward(&self, x: &Array2<f64>, grad_output: &Array1<f64>) -> LinearParams {
        LinearParams {
            weights: x.t().dot(grad_output),
            bias: grad_output.sum(),
        }
    }

    fn params(&self) -> &LinearParams {
        &self.params
    }

    fn update_params(&mut self, params: &LinearParams) {
        self.params = params.clone();
    }

    fn into_fitted(self) -> LinearModel<Fitted> {
        LinearModel::<Fitted>::new(self.params)
    }
}

impl LinearModel<Fitted> {
    pub fn new(params: LinearParams) -> Self {
        Self {
            params,
            _state: PhantomData,
        }
    }

    pub fn params(&self) -> &LinearParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.params.weights.len()
    }

    pub fn predict(&self, x: ArrayView1<f64>) -> f64 {
        self.params.weights.dot(&x) + self.params.bias
    }

    pub fn predict_batch(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PipelineError::InvalidArgument(format!(
                "model expects {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.params.weights) + self.params.bias)
    }

    pub fn extract_params(&self) -> SerializableLinearParams {
        (&self.params).into()
    }

    pub fn from_params(params: SerializableLinearParams) -> Result<Self> {
        Ok(Self::new(LinearParams::try_from(params)?))
    }
}
