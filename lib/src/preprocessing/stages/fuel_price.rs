//! Jet fuel price at departure and destination countries.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::reference::ReferenceTable;
use crate::preprocessing::Preprocessor;
use std::path::PathBuf;

pub const COUNTRY_KEY: &str = "country_code";
pub const PRICE_FIELD: &str = "price_per_liter";

/// Adds `fuel_price_adep` and `fuel_price_ades` by joining a price table on
/// `country_code_adep` and `country_code_ades`.
#[derive(Debug, Clone)]
pub struct FuelPricePreprocessor {
    path: PathBuf,
}

impl FuelPricePreprocessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Preprocessor for FuelPricePreprocessor {
    fn name(&self) -> &str {
        "fuel_price"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.display().to_string(),
            "content": content_fingerprint(&self.path),
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let prices = ReferenceTable::load(&self.path, COUNTRY_KEY)?;
        for side in ["adep", "ades"] {
            let key_column = format!("country_code_{}", side);
            let lookup = prices.lookup(
                dataset.table.column(&key_column)?,
                &[PRICE_FIELD],
                "",
                None,
            )?;
            if lookup.misses > 0 {
                tracing::warn!(key = %key_column, misses = lookup.misses, "no fuel price for country");
            }
            for column in lookup.columns {
                dataset
                    .table
                    .insert_column(column.with_name(format!("fuel_price_{}", side)))?;
            }
        }
        Ok(dataset)
    }
}
