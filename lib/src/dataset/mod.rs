//! Named datasets and their train/test partitioning.
//!
//! A [`Dataset`] owns a [`Table`] of flight records plus a provenance label.
//! It is moved by value through the preprocessing chain, so at any time exactly
//! one stage holds it.
//!
//! # Example
//!
//! ```rust
//! use atow::dataset::Dataset;
//! use atow::table::{Column, Table};
//!
//! let table = Table::from_columns(vec![
//!     Column::from_strs("flight_id", &["a", "b", "c", "d", "e"]),
//!     Column::from_f64s("tow", &[1.0, 2.0, 3.0, 4.0, 5.0]),
//! ])
//! .unwrap();
//! let dataset = Dataset::new(table, "challenge_set.csv");
//!
//! let (train, test) = dataset.split(0.8, 0).unwrap();
//! assert_eq!(train.len() + test.len(), 5);
//!
//! let folds = dataset.k_fold_split(5, 0).unwrap();
//! assert_eq!(folds.len(), 5);
//! ```

use crate::error::Result;
use crate::table::{io, Table};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

mod split;

pub use split::{fold_sizes, DEFAULT_SPLIT_SEED, DEFAULT_TRAIN_PERCENT};

/// Name of the flight identifier column used for joins.
pub const FLIGHT_ID: &str = "flight_id";

/// Name of the prediction target column (actual takeoff weight).
pub const TARGET: &str = "tow";

/// A table of flight records plus a human-readable name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub table: Table,
    pub name: String,
}

impl Dataset {
    pub fn new(table: Table, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
        }
    }

    /// Loads a dataset from CSV, naming it after the file.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let table = io::read_csv(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(table, name))
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        io::write_csv(&self.table, path)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.table.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Content fingerprint: SHA-256 (hex) of the binary encoding of name and table.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = bincode::serialize(self)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Binary encoding used by the preprocessing cache.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
