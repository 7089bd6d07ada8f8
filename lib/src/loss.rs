//! Differentiable loss functions used by the [`Trainer`](crate::trainer::Trainer).

use ndarray::Array1;

/// A differentiable loss over a batch of predictions.
///
/// `grad_wrt_prediction` is what the model's `backward` consumes.
pub trait Loss {
    /// Scalar loss value, averaged over the batch.
    fn loss(&self, prediction: &Array1<f64>, target: &Array1<f64>) -> f64;

    /// Gradient of the loss with respect to each prediction.
    fn grad_wrt_prediction(&self, prediction: &Array1<f64>, target: &Array1<f64>) -> Array1<f64>;
}

/// Mean squared error: `(1/n) * Σ(pred - target)^2`.
///
/// The gradient omits the factor 2; the learning rate absorbs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss;

impl Loss for MSELoss {
    fn loss(&self, prediction: &Array1<f64>, target: &Array1<f64>) -> f64 {
        let diff = prediction - target;
        diff.dot(&diff) / prediction.len().max(1) as f64
    }

    fn grad_wrt_prediction(&self, prediction: &Array1<f64>, target: &Array1<f64>) -> Array1<f64> {
        (prediction - target) / prediction.len().max(1) as f64
    }
}

/// Mean absolute error: `(1/n) * Σ|pred - target|`. Uses the subgradient 0 at 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct MAELoss;

impl Loss for MAELoss {
    fn loss(&self, prediction: &Array1<f64>, target: &Array1<f64>) -> f64 {
        (prediction - target).mapv(f64::abs).sum() / prediction.len().max(1) as f64
    }

    fn grad_wrt_prediction(&self, prediction: &Array1<f64>, target: &Array1<f64>) -> Array1<f64> {
        let n = prediction.len().max(1) as f64;
        (prediction - target).mapv(|d| if d == 0.0 { 0.0 } else { d.signum() / n })
    }
}
