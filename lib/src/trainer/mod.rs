//! Mini-batch gradient-descent training loop.
//!
//! A [`Trainer`] combines a loss, an optimizer and a regularizer and fits any
//! [`TrainableModel`] over dense `ndarray` inputs. It is immutable once built
//! and can be reused for several models of the same type.

use crate::error::{PipelineError, Result};
use crate::loss::Loss;
use crate::model::{ParamOps, TrainableModel};
use crate::optimizer::Optimizer;
use crate::regularizers::Regularizer;
use ndarray::{s, Array1, Array2};
use std::marker::PhantomData;
use std::time::Instant;
use tracing::debug;

/// Summary of a `fit` call.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainReport {
    pub epochs: usize,
    pub final_loss: f64,
    /// The deadline passed before `max_epochs` were run.
    pub stopped_early: bool,
}

pub struct Trainer<L, O, M, R> {
    pub(crate) batch_size: usize,
    pub(crate) max_epochs: usize,
    pub(crate) verbose: bool,
    pub(crate) deadline: Option<Instant>,
    pub(crate) loss_fn: L,
    pub(crate) optimizer: O,
    pub(crate) regularizer: R,
    _model: PhantomData<fn() -> M>,
}

/// Fluent builder for [`Trainer`].
///
/// Defaults: `batch_size` 32, `max_epochs` 1000, `verbose` true, no deadline.
pub struct TrainerBuilder<L, O, M, R> {
    batch_size: usize,
    max_epochs: usize,
    verbose: bool,
    deadline: Option<Instant>,
    loss_fn: L,
    optimizer: O,
    regularizer: R,
    _model: PhantomData<fn() -> M>,
}

impl<L, O, M, R> TrainerBuilder<L, O, M, R> {
    pub fn new(loss_fn: L, optimizer: O, regularizer: R) -> Self {
        Self {
            batch_size: 32,
            max_epochs: 1000,
            verbose: true,
            deadline: None,
            loss_fn,
            optimizer,
            regularizer,
            _model: PhantomData,
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    /// Logs the loss of every epoch at debug level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Stop after the epoch during which `deadline` passes. At least one epoch always runs.
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn build(self) -> Trainer<L, O, M, R> {
        Trainer {
            batch_size: self.batch_size,
            max_epochs: self.max_epochs,
            verbose: self.verbose,
            deadline: self.deadline,
            loss_fn: self.loss_fn,
            optimizer: self.optimizer,
            regularizer: self.regularizer,
            _model: PhantomData,
        }
    }
}

impl<L, O, M, R> Trainer<L, O, M, R> {
    pub fn builder(loss_fn: L, optimizer: O, regularizer: R) -> TrainerBuilder<L, O, M, R> {
        TrainerBuilder::new(loss_fn, optimizer, regularizer)
    }
}

impl<L, O, M, P, R> Trainer<L, O, M, R>
where
    L: Loss,
    M: TrainableModel<Input = Array2<f64>, Prediction = Array1<f64>, Params = P, Gradients = P>,
    O: Optimizer<P>,
    R: Regularizer<M>,
    P: ParamOps,
{
    /// Runs up to `max_epochs` passes over `(x, y)` in row order.
    ///
    /// # Errors
    /// `InvalidArgument` for empty data, mismatched lengths, a zero batch size,
    /// or a loss that becomes non-finite.
    pub fn fit(&self, mut model: M, x: &Array2<f64>, y: &Array1<f64>) -> Result<(M::Output, TrainReport)> {
        let n = x.nrows();
        if n == 0 {
            return Err(PipelineError::InvalidArgument("training data is empty".to_string()));
        }
        if y.len() != n {
            return Err(PipelineError::InvalidArgument(format!(
                "{} feature rows but {} targets",
                n,
                y.len()
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidArgument("batch size must be positive".to_string()));
        }

        let mut report = TrainReport {
            epochs: 0,
            final_loss: f64::NAN,
            stopped_early: false,
        };

        for epoch in 0..self.max_epochs {
            let mut weighted_loss = 0.0;
            let mut penalty = 0.0;
            for start in (0..n).step_by(self.batch_size) {
                let end = (start + self.batch_size).min(n);
                let batch_x = x.slice(s![start..end, ..]).to_owned();
                let batch_y = y.slice(s![start..end]).to_owned();

                let preds = model.forward(&batch_x);
                weighted_loss += self.loss_fn.loss(&preds, &batch_y) * (end - start) as f64;

                let (reg_penalty, reg_grad) = self.regularizer.regularizer_penalty_grad(&model);
                penalty = reg_penalty;
                let grad_preds = self.loss_fn.grad_wrt_prediction(&preds, &batch_y);
                let grads = model.backward(&batch_x, &grad_preds).add(&reg_grad);
                let new_params = self.optimizer.step(model.params(), &grads);
                model.update_params(&new_params);
            }

            let epoch_loss = weighted_loss / n as f64 + penalty;
            if !epoch_loss.is_finite() {
                return Err(PipelineError::InvalidArgument(format!(
                    "training diverged at epoch {}; lower the learning rate",
                    epoch
                )));
            }
            report.epochs = epoch + 1;
            report.final_loss = epoch_loss;
            if self.verbose {
                debug!(epoch, loss = epoch_loss, "epoch finished");
            }

            if self.deadline.is_some_and(|d| Instant::now() >= d) && epoch + 1 < self.max_epochs {
                report.stopped_early = true;
                break;
            }
        }

        Ok((model.into_fitted(), report))
    }
}
