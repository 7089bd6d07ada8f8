//! Constant predictors: the training mean or median of the target.

use super::Model;
use crate::dataset::TARGET;
use crate::error::{PipelineError, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn target_values(data: &Table, target: &str) -> Result<Vec<f64>> {
    let values: Vec<f64> = data
        .column(target)?
        .to_f64()?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(PipelineError::InvalidArgument(format!(
            "column '{}' has no values to train on",
            target
        )));
    }
    Ok(values)
}

fn constant(value: Option<f64>, name: &str, data: &Table) -> Result<Vec<f64>> {
    let value = value.ok_or_else(|| PipelineError::ModelState(format!("{} has not been trained", name)))?;
    Ok(vec![value; data.n_rows()])
}

/// Predicts the mean training target for every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageModel {
    name: String,
    mean: Option<f64>,
}

impl Default for AverageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AverageModel {
    pub fn new() -> Self {
        Self {
            name: "AverageModel".to_string(),
            mean: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Model for AverageModel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn train(&mut self, data: &Table) -> Result<()> {
        let values = target_values(data, TARGET)?;
        self.mean = Some(values.iter().sum::<f64>() / values.len() as f64);
        Ok(())
    }

    fn predict(&self, data: &Table) -> Result<Vec<f64>> {
        constant(self.mean, &self.name, data)
    }

    fn info(&self) -> serde_json::Value {
        json!({ "mean_value": self.mean })
    }
}

/// Predicts the median training target for every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianModel {
    name: String,
    median: Option<f64>,
}

impl Default for MedianModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MedianModel {
    pub fn new() -> Self {
        Self {
            name: "MedianModel".to_string(),
            median: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Model for MedianModel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn train(&mut self, data: &Table) -> Result<()> {
        let mut values = target_values(data, TARGET)?;
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        self.median = Some(if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        });
        Ok(())
    }

    fn predict(&self, data: &Table) -> Result<Vec<f64>> {
        constant(self.median, &self.name, data)
    }

    fn info(&self) -> serde_json::Value {
        json!({ "median_value": self.median })
    }
}
