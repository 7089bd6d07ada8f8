//! Ensembles that average the predictions of several models.

use super::Model;
use crate::error::{PipelineError, Result};
use crate::table::Table;
use tracing::info;

/// Averages the predictions of several models.
pub struct EnsembleModel {
    name: String,
    models: Vec<Box<dyn Model>>,
}

impl EnsembleModel {
    /// Named `Ens([a, b, ...])` after its members.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty model list.
    pub fn new(models: Vec<Box<dyn Model>>) -> Result<Self> {
        if models.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "an ensemble needs at least one model".to_string(),
            ));
        }
        let names: Vec<String> = models.iter().map(|m| m.name()).collect();
        Ok(Self {
            name: format!("Ens([{}])", names.join(", ")),
            models,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn models(&self) -> &[Box<dyn Model>] {
        &self.models
    }
}

impl std::fmt::Debug for EnsembleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleModel")
            .field("name", &self.name)
            .field("models", &self.models.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Model for EnsembleModel {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn train(&mut self, data: &Table) -> Result<()> {
        for model in &mut self.models {
            info!(ensemble = %self.name, model = %model.name(), "training ensemble member");
            model.train(data)?;
        }
        Ok(())
    }

    fn predict(&self, data: &Table) -> Result<Vec<f64>> {
        let mut sum = vec![0.0; data.n_rows()];
        for model in &self.models {
            let predictions = model.predict(data)?;
            if predictions.len() != sum.len() {
                return Err(PipelineError::InvalidArgument(format!(
                    "{} returned {} predictions for {} rows",
                    model.name(),
                    predictions.len(),
                    sum.len()
                )));
            }
            for (acc, p) in sum.iter_mut().zip(predictions) {
                *acc += p;
            }
        }
        let k = self.models.len() as f64;
        Ok(sum.into_iter().map(|s| s / k).collect())
    }

    fn info(&self) -> serde_json::Value {
        self.models
            .iter()
            .map(|m| (m.name(), m.info()))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AverageModel, MedianModel};
    use crate::table::Column;

    struct Fixed(&'static str, Vec<f64>);

    impl Model for Fixed {
        fn name(&self) -> String {
            self.0.to_string()
        }
        fn train(&mut self, _: &Table) -> Result<()> {
            Ok(())
        }
        fn predict(&self, _: &Table) -> Result<Vec<f64>> {
            Ok(self.1.clone())
        }
        fn info(&self) -> serde_json::Value {
            serde_json::json!({ "fixed": self.1 })
        }
    }

    fn rows(n: usize) -> Table {
        Table::from_columns(vec![Column::from_f64s("tow", &vec![1.0; n])]).unwrap()
    }

    #[test]
    fn test_elementwise_mean() {
        let ens = EnsembleModel::new(vec![
            Box::new(Fixed("a", vec![1.0, 2.0])),
            Box::new(Fixed("b", vec![3.0, 6.0])),
        ])
        .unwrap();
        assert_eq!(ens.name(), "Ens([a, b])");
        assert_eq!(ens.predict(&rows(2)).unwrap(), vec![2.0, 4.0]);
        assert_eq!(ens.info()["b"]["fixed"][1], 6.0);
    }

    #[test]
    fn test_length_mismatch() {
        let ens = EnsembleModel::new(vec![
            Box::new(Fixed("a", vec![1.0, 2.0])),
            Box::new(Fixed("b", vec![3.0])),
        ])
        .unwrap();
        assert!(matches!(
            ens.predict(&rows(2)),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_ensemble_rejected() {
        assert!(EnsembleModel::new(Vec::new()).is_err());
    }

    #[test]
    fn test_trains_all_members() {
        let table = Table::from_columns(vec![Column::from_f64s("tow", &[1.0, 2.0, 9.0])]).unwrap();
        let mut ens = EnsembleModel::new(vec![
            Box::new(AverageModel::new()),
            Box::new(MedianModel::new()),
        ])
        .unwrap();
        assert!(ens.predict(&table).is_err());
        ens.train(&table).unwrap();
        // mean 4, median 2
        assert_eq!(ens.predict(&table).unwrap(), vec![3.0; 3]);
        assert_eq!(ens.name(), "Ens([AverageModel, MedianModel])");
    }
}
