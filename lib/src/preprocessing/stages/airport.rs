//! Departure and destination airport attributes.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::preprocessing::pool::WorkerPool;
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::reference::ReferenceTable;
use crate::preprocessing::Preprocessor;
use std::path::PathBuf;
use std::sync::Arc;

/// Airport table key column.
pub const AIRPORT_KEY: &str = "ident";

/// Attributes copied for each airport.
pub const AIRPORT_FIELDS: [&str; 7] = [
    "latitude_deg",
    "longitude_deg",
    "elevation_ft",
    "municipality",
    "iso_region",
    "continent",
    "type",
];

/// Joins airport attributes on `adep` and `ades`, adding `adep_<field>` and
/// `ades_<field>` columns. Unknown codes yield missing values.
#[derive(Debug, Clone)]
pub struct AirportPreprocessor {
    path: PathBuf,
    fields: Vec<String>,
    pool: Option<Arc<WorkerPool>>,
}

impl AirportPreprocessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fields: AIRPORT_FIELDS.iter().map(|f| f.to_string()).collect(),
            pool: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Resolve distinct airport codes on `pool`.
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }
}

impl Preprocessor for AirportPreprocessor {
    fn name(&self) -> &str {
        "airport"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.display().to_string(),
            "content": content_fingerprint(&self.path),
            "fields": self.fields,
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let airports = ReferenceTable::load(&self.path, AIRPORT_KEY)?;
        let fields: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        for side in ["adep", "ades"] {
            airports.join_into(
                &mut dataset.table,
                side,
                &fields,
                &format!("{}_", side),
                self.pool.as_deref(),
            )?;
        }
        Ok(dataset)
    }
}
