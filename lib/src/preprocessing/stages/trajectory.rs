//! Join of the precomputed per-flight trajectory feature store.
//!
//! The store is produced by a separate batch job. This stage only joins it and
//! refuses to continue when the store does not cover the dataset.

use crate::dataset::{Dataset, FLIGHT_ID};
use crate::error::{PipelineError, Result};
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::reference::ReferenceTable;
use crate::preprocessing::Preprocessor;
use crate::table::io;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TrajectoryPreprocessor {
    store: PathBuf,
}

impl TrajectoryPreprocessor {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
        }
    }

    fn load_store(&self) -> Result<ReferenceTable> {
        if !self.store.exists() {
            return Err(PipelineError::Config(format!(
                "trajectory feature store not found at {}; run the trajectory batch job first",
                self.store.display()
            )));
        }
        let table = io::read_csv(&self.store)?;
        if !table.has_column(FLIGHT_ID) {
            return Err(PipelineError::Config(format!(
                "trajectory feature store {} has no '{}' column",
                self.store.display(),
                FLIGHT_ID
            )));
        }
        ReferenceTable::from_table(table, FLIGHT_ID)
    }
}

impl Preprocessor for TrajectoryPreprocessor {
    fn name(&self) -> &str {
        "trajectory"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "store": self.store.display().to_string(),
            "content": content_fingerprint(&self.store),
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let store = self.load_store()?;
        let ids = dataset.table.column(FLIGHT_ID)?;

        let mut missing = 0;
        let mut first = None;
        for row in 0..ids.len() {
            let key = ids.key(row);
            if key.as_deref().and_then(|k| store.row_of(k)).is_none() {
                missing += 1;
                if first.is_none() {
                    first = Some(key.unwrap_or_else(|| "<missing id>".to_string()));
                }
            }
        }
        if let Some(first) = first {
            return Err(PipelineError::IncompleteFeatureStore { missing, first });
        }

        let fields: Vec<&str> = store
            .value_columns()
            .into_iter()
            .filter(|name| {
                let clash = dataset.table.has_column(name);
                if clash {
                    warn!(column = name, "trajectory feature shadows an existing column, skipped");
                }
                !clash
            })
            .collect();
        store.join_into(&mut dataset.table, FLIGHT_ID, &fields, "", None)?;
        info!(flights = dataset.len(), features = fields.len(), "trajectory features joined");
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Table};

    fn flights(ids: &[i64]) -> Dataset {
        let table = Table::from_columns(vec![
            Column::int("flight_id", ids.iter().map(|&i| Some(i)).collect()),
            Column::from_f64s("tow", &vec![1.0; ids.len()]),
        ])
        .unwrap();
        Dataset::new(table, "flights")
    }

    fn store(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory_features.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_joins_by_flight_id() {
        let (_dir, path) = store("flight_id,climb_rate,cruise_alt\n1,1500,35000\n2,1800,37000\n3,1,1\n");
        let out = TrajectoryPreprocessor::new(&path).process(flights(&[2, 1])).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            out.table.column("cruise_alt").unwrap().to_f64().unwrap(),
            vec![Some(37000.0), Some(35000.0)]
        );
    }

    #[test]
    fn test_missing_store_is_config() {
        let err = TrajectoryPreprocessor::new("/no/store.csv")
            .process(flights(&[1]))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_incomplete_store_is_fatal() {
        let (_dir, path) = store("flight_id,climb_rate\n1,1500\n");
        let err = TrajectoryPreprocessor::new(&path)
            .process(flights(&[1, 7, 8]))
            .unwrap_err();
        match err {
            PipelineError::IncompleteFeatureStore { missing, first } => {
                assert_eq!(missing, 2);
                assert_eq!(first, "7");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_store_keys() {
        let (_dir, path) = store("flight_id,climb_rate\n1,1500\n1,1600\n");
        let err = TrajectoryPreprocessor::new(&path)
            .process(flights(&[1]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateKey { .. }));
    }

    #[test]
    fn test_existing_columns_are_not_overwritten() {
        let (_dir, path) = store("flight_id,tow,climb_rate\n1,99,1500\n");
        let out = TrajectoryPreprocessor::new(&path).process(flights(&[1])).unwrap();
        assert_eq!(out.table.dense_f64("tow").unwrap(), vec![1.0]);
        assert!(out.table.has_column("climb_rate"));
    }

    #[test]
    fn test_regenerated_store_invalidates_cache() {
        use crate::preprocessing::{PreprocessingCache, Stage, DEFAULT_BYTES_LIMIT};

        let (_dir, path) = store("flight_id,climb_rate\n1,1500\n");
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = PreprocessingCache::open(cache_dir.path(), DEFAULT_BYTES_LIMIT).unwrap();
        let cached = Stage::new(TrajectoryPreprocessor::new(&path));
        let uncached = Stage::new(TrajectoryPreprocessor::new(&path)).no_cache();

        cached.apply(flights(&[1]), Some(&cache)).unwrap();
        std::fs::write(&path, "flight_id,climb_rate\n1,2222\n").unwrap();

        let from_cache = cached.apply(flights(&[1]), Some(&cache)).unwrap();
        let fresh = uncached.apply(flights(&[1]), Some(&cache)).unwrap();
        assert_eq!(from_cache, fresh);
        assert_eq!(
            fresh.table.column("climb_rate").unwrap().to_f64().unwrap(),
            vec![Some(2222.0)]
        );
    }
}
