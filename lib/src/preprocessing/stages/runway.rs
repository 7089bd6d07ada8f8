//! Runway dimensions at departure and destination airports.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::pool::WorkerPool;
use crate::preprocessing::reference::ReferenceTable;
use crate::preprocessing::Preprocessor;
use crate::table::{io, Column, Table};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Runway table column naming the airport.
pub const RUNWAY_KEY: &str = "airport_ident";

/// Runway table column flagging closed runways.
pub const RUNWAY_CLOSED: &str = "closed";

pub const RUNWAY_FIELDS: [&str; 5] = [
    "length_ft",
    "he_elevation_ft",
    "le_elevation_ft",
    "he_displaced_threshold_ft",
    "le_displaced_threshold_ft",
];

/// Adds `runway_adep_<field>` and `runway_ades_<field>`, each the maximum of
/// the field over the airport's open runways. Airports without an open
/// runway get missing values.
#[derive(Debug, Clone)]
pub struct RunwayPreprocessor {
    path: PathBuf,
    pool: Option<Arc<WorkerPool>>,
}

impl RunwayPreprocessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    fn column<'a>(&self, runways: &'a Table, name: &str) -> Result<&'a Column> {
        runways.column(name).map_err(|_| {
            PipelineError::Config(format!(
                "runway table {} has no '{}' column",
                self.path.display(),
                name
            ))
        })
    }

    /// One row per airport with the per-field maxima over open runways.
    fn per_airport(&self) -> Result<ReferenceTable> {
        let runways = io::read_csv(&self.path)?;
        let airports = self.column(&runways, RUNWAY_KEY)?;
        let fields = RUNWAY_FIELDS
            .iter()
            .map(|f| self.column(&runways, f)?.to_f64())
            .collect::<Result<Vec<_>>>()?;
        // A table without the flag has no closed runways.
        let closed = runways.column(RUNWAY_CLOSED).ok();

        let mut maxima: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for row in 0..runways.n_rows() {
            let open = closed.map_or(true, |c| {
                matches!(
                    c.key(row).map(|k| k.to_ascii_lowercase()).as_deref(),
                    Some("0" | "false")
                )
            });
            let Some(airport) = airports.key(row).filter(|_| open) else {
                continue;
            };
            let slots = maxima
                .entry(airport)
                .or_insert_with(|| vec![None; fields.len()]);
            for (slot, values) in slots.iter_mut().zip(&fields) {
                if let Some(v) = values[row] {
                    *slot = Some(slot.map_or(v, |m| m.max(v)));
                }
            }
        }
        debug!(airports = maxima.len(), "aggregated open runways");

        let mut columns = vec![Column::str(
            RUNWAY_KEY,
            maxima.keys().map(|k| Some(k.clone())).collect(),
        )];
        for (i, field) in RUNWAY_FIELDS.iter().enumerate() {
            columns.push(Column::float(
                *field,
                maxima.values().map(|slots| slots[i]).collect(),
            ));
        }
        ReferenceTable::from_table(Table::from_columns(columns)?, RUNWAY_KEY)
    }
}

impl Preprocessor for RunwayPreprocessor {
    fn name(&self) -> &str {
        "runway"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.display().to_string(),
            "content": content_fingerprint(&self.path),
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let runways = self.per_airport()?;
        for side in ["adep", "ades"] {
            runways.join_into(
                &mut dataset.table,
                side,
                &RUNWAY_FIELDS,
                &format!("runway_{}_", side),
                self.pool.as_deref(),
            )?;
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNWAYS: &str = "\
airport_ident,length_ft,closed,he_elevation_ft,le_elevation_ft,he_displaced_threshold_ft,le_displaced_threshold_ft
EGLL,12799,0,75,78,1000,
EGLL,12008,0,77,80,,1012
EGLL,14000,1,70,70,,
LFPG,13829,1,,,,
";

    fn flights() -> Dataset {
        let table = Table::from_columns(vec![
            Column::from_strs("adep", &["EGLL", "LFPG"]),
            Column::from_strs("ades", &["KJFK", "EGLL"]),
        ])
        .unwrap();
        Dataset::new(table, "flights")
    }

    #[test]
    fn test_maxima_over_open_runways() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runways.csv");
        std::fs::write(&path, RUNWAYS).unwrap();

        let out = RunwayPreprocessor::new(&path)
            .with_pool(Arc::new(WorkerPool::new(2).unwrap()))
            .process(flights())
            .unwrap();
        let col = |name: &str| out.table.column(name).unwrap().to_f64().unwrap();

        // the closed 14000 ft runway is ignored, LFPG has no open runway
        assert_eq!(col("runway_adep_length_ft"), vec![Some(12799.0), None]);
        assert_eq!(col("runway_adep_le_elevation_ft"), vec![Some(80.0), None]);
        assert_eq!(col("runway_adep_he_displaced_threshold_ft"), vec![Some(1000.0), None]);
        assert_eq!(col("runway_ades_length_ft"), vec![None, Some(12799.0)]);
        assert_eq!(col("runway_ades_le_displaced_threshold_ft"), vec![None, Some(1012.0)]);
    }

    #[test]
    fn test_missing_inputs_are_config_errors() {
        let err = RunwayPreprocessor::new("/no/runways.csv")
            .process(flights())
            .unwrap_err();
        assert!(err.is_config());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runways.csv");
        std::fs::write(&path, "airport_ident,closed\nEGLL,0\n").unwrap();
        let err = RunwayPreprocessor::new(&path).process(flights()).unwrap_err();
        assert!(err.is_config());
    }
}
