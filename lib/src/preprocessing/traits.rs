//! Core trait for preprocessing stages.
//!
//! A [`Preprocessor`] maps a [`Dataset`] to a transformed [`Dataset`]. It owns
//! its input for the duration of the call and returns the (possibly replaced)
//! dataset, so the pipeline never shares a table between two stages.

use crate::dataset::Dataset;
use crate::error::Result;

/// A unit of work in the feature-engineering pipeline.
///
/// Implementations must be correct when `process` is called directly; the
/// caching layer in [`Stage`](super::Stage) only decides *whether* to call it.
///
/// # Example
/// ```rust
/// use atow::dataset::Dataset;
/// use atow::error::Result;
/// use atow::preprocessing::Preprocessor;
/// use atow::table::Column;
///
/// struct AddConstant(f64);
///
/// impl Preprocessor for AddConstant {
///     fn name(&self) -> &str {
///         "add_constant"
///     }
///
///     fn params(&self) -> serde_json::Value {
///         serde_json::json!({ "value": self.0 })
///     }
///
///     fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
///         let n = dataset.len();
///         dataset
///             .table
///             .insert_column(Column::from_f64s("constant", &vec![self.0; n]))?;
///         Ok(dataset)
///     }
/// }
/// ```
pub trait Preprocessor: Send + Sync {
    /// Stable identifier of the transformation; part of the cache key.
    fn name(&self) -> &str;

    /// Constructor parameters that influence the output; part of the cache key.
    fn params(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Transforms the dataset.
    ///
    /// # Errors
    /// Configuration errors for missing reference data, `MissingColumn` when an
    /// earlier stage did not provide a required column, or stage-specific errors.
    fn process(&self, dataset: Dataset) -> Result<Dataset>;
}

impl<P: Preprocessor + ?Sized> Preprocessor for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn params(&self) -> serde_json::Value {
        (**self).params()
    }

    fn process(&self, dataset: Dataset) -> Result<Dataset> {
        (**self).process(dataset)
    }
}
