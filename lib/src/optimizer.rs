//! Parameter update rules.

use crate::model::ParamOps;

/// Turns gradients into a parameter update.
///
/// `step` returns new parameters instead of mutating in place, so the
/// training loop owns the only copy of the current state.
pub trait Optimizer<P> {
    fn step(&self, params: &P, gradients: &P) -> P;
}

/// Plain stochastic gradient descent: `θ ← θ - η · ∇L(θ)`.
#[derive(Debug, Clone, Copy)]
pub struct SGD {
    lr: f64,
}

impl SGD {
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }
}

impl<P: ParamOps> Optimizer<P> for SGD {
    fn step(&self, params: &P, gradients: &P) -> P {
        params.add(&gradients.scale(-self.lr))
    }
}
