//! Weight penalties added to the training loss.

use crate::model::linear::{LinearParams, LinearRegression};
use crate::model::TrainableModel;

/// Penalty value and its gradient with respect to the model parameters.
pub trait Regularizer<M: TrainableModel> {
    fn regularizer_penalty_grad(&self, model: &M) -> (f64, M::Gradients);
}

/// No penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegularizer;

/// Ridge penalty `λ · ||w||²`. The bias is not penalized.
#[derive(Debug, Clone, Copy)]
pub struct L2 {
    pub lambda: f64,
}

/// Lasso penalty `λ · ||w||₁`. The bias is not penalized.
#[derive(Debug, Clone, Copy)]
pub struct L1 {
    pub lambda: f64,
}

impl L2 {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl L1 {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl Regularizer<LinearRegression> for NoRegularizer {
    fn regularizer_penalty_grad(&self, model: &LinearRegression) -> (f64, LinearParams) {
        (0.0, LinearParams::zeros(model.params().weights.len()))
    }
}

impl Regularizer<LinearRegression> for L2 {
    fn regularizer_penalty_grad(&self, model: &LinearRegression) -> (f64, LinearParams) {
        let w = &model.params().weights;
        let penalty = self.lambda * w.dot(w);
        let grad = LinearParams {
            weights: w * (2.0 * self.lambda),
            bias: 0.0,
        };
        (penalty, grad)
    }
}

impl Regularizer<LinearRegression> for L1 {
    fn regularizer_penalty_grad(&self, model: &LinearRegression) -> (f64, LinearParams) {
        let w = &model.params().weights;
        let penalty = self.lambda * w.mapv(f64::abs).sum();
        let grad = LinearParams {
            weights: w.mapv(|v| if v == 0.0 { 0.0 } else { self.lambda * v.signum() }),
            bias: 0.0,
        };
        (penalty, grad)
    }
}

/// Regularizer choice that can be stored in a serialized model configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    #[default]
    None,
    L1(f64),
    L2(f64),
}

impl Regularizer<LinearRegression> for Penalty {
    fn regularizer_penalty_grad(&self, model: &LinearRegression) -> (f64, LinearParams) {
        match *self {
            Penalty::None => NoRegularizer.regularizer_penalty_grad(model),
            Penalty::L1(lambda) => L1::new(lambda).regularizer_penalty_grad(model),
            Penalty::L2(lambda) => L2::new(lambda).regularizer_penalty_grad(model),
        }
    }
}
