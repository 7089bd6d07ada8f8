//! Aircraft performance attributes keyed by ICAO type designator.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::reference::ReferenceTable;
use crate::preprocessing::Preprocessor;
use std::path::PathBuf;

pub const AIRCRAFT_KEY: &str = "aircraft_type";

/// Joins every column of a performance table (such as `mtow`, `mlw`) on
/// `aircraft_type`, prefixing the new columns with `ac_`.
#[derive(Debug, Clone)]
pub struct AircraftPerformancePreprocessor {
    path: PathBuf,
}

impl AircraftPerformancePreprocessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Preprocessor for AircraftPerformancePreprocessor {
    fn name(&self) -> &str {
        "aircraft_performance"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.display().to_string(),
            "content": content_fingerprint(&self.path),
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let aircraft = ReferenceTable::load(&self.path, AIRCRAFT_KEY)?;
        let fields = aircraft.value_columns();
        aircraft.join_into(&mut dataset.table, AIRCRAFT_KEY, &fields, "ac_", None)?;
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Table};

    #[test]
    fn test_joins_all_performance_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircraft.csv");
        std::fs::write(&path, "aircraft_type,mtow,mlw\nA320,78000,66000\nB738,79016,66361\n").unwrap();

        let table = Table::from_columns(vec![Column::from_strs(
            "aircraft_type",
            &["B738", "A320", "XXXX"],
        )])
        .unwrap();
        let out = AircraftPerformancePreprocessor::new(&path)
            .process(Dataset::new(table, "flights"))
            .unwrap();

        let mtow = out.table.column("ac_mtow").unwrap().to_f64().unwrap();
        assert_eq!(mtow, vec![Some(79016.0), Some(78000.0), None]);
        assert!(out.table.has_column("ac_mlw"));
        assert!(!out.table.has_column("ac_aircraft_type"));
    }
}
