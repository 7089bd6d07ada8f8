//! Columnar in-memory table with named, typed columns.
//!
//! A [`Table`] is the unit of data every preprocessing stage and model works on.
//! Columns are kept in insertion order so that the binary encoding of a table
//! (and therefore its cache fingerprint) is deterministic.
//!
//! # Example
//!
//! ```rust
//! use atow::table::{Column, Table};
//!
//! let table = Table::from_columns(vec![
//!     Column::from_strs("flight_id", &["f1", "f2"]),
//!     Column::from_f64s("tow", &[61_000.0, 74_500.0]),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.n_rows(), 2);
//! assert!(table.has_column("tow"));
//! ```

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

mod column;
pub mod io;

pub use column::{Column, ColumnData, DType, Value};

/// Ordered collection of equal-length columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from columns. Lengths must agree and names must be unique.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut table = Table::new();
        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.name().to_string()) {
                return Err(PipelineError::InvalidArgument(format!(
                    "duplicate column name '{}'",
                    column.name()
                )));
            }
            table.insert_column(column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Looks up a column by name.
    ///
    /// # Errors
    /// [`PipelineError::MissingColumn`] if no column has that name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| PipelineError::missing_column(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        match self.position(name) {
            Some(i) => Ok(&mut self.columns[i]),
            None => Err(PipelineError::missing_column(name)),
        }
    }

    /// Adds a column, replacing any existing column with the same name in place.
    pub fn insert_column(&mut self, column: Column) -> Result<()> {
        if self.columns.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(PipelineError::InvalidArgument(format!(
                "column '{}' has {} rows, table has {}",
                column.name(),
                column.len(),
                self.n_rows
            )));
        }
        match self.position(column.name()) {
            Some(i) => self.columns[i] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Removes the named columns. Names not present are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        self.columns.retain(|c| !names.contains(&c.name()));
    }

    /// Removes and returns a column.
    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        match self.position(name) {
            Some(i) => Ok(self.columns.remove(i)),
            None => Err(PipelineError::missing_column(name)),
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.has_column(to) {
            return Err(PipelineError::InvalidArgument(format!(
                "cannot rename '{}' to existing column '{}'",
                from, to
            )));
        }
        self.column_mut(from)?.rename(to);
        Ok(())
    }

    /// New table with the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Result<Table> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows) {
            return Err(PipelineError::InvalidArgument(format!(
                "row index {} out of bounds for table with {} rows",
                bad, self.n_rows
            )));
        }
        Ok(Table {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            n_rows: indices.len(),
        })
    }

    /// New table with the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<Table> {
        if mask.len() != self.n_rows {
            return Err(PipelineError::InvalidArgument(format!(
                "mask has {} entries, table has {} rows",
                mask.len(),
                self.n_rows
            )));
        }
        Ok(Table {
            columns: self.columns.iter().map(|c| c.filter(mask)).collect(),
            n_rows: mask.iter().filter(|&&m| m).count(),
        })
    }

    /// Fails with [`PipelineError::DuplicateKey`] if `key` repeats a non-missing value.
    pub fn ensure_unique(&self, key: &str) -> Result<()> {
        let column = self.column(key)?;
        let mut seen = HashSet::with_capacity(self.n_rows);
        for row in 0..self.n_rows {
            if let Some(k) = column.key(row) {
                if !seen.insert(k.clone()) {
                    return Err(PipelineError::DuplicateKey {
                        column: key.to_string(),
                        key: k,
                    });
                }
            }
        }
        Ok(())
    }

    /// Numeric values of a column, failing on missing cells.
    pub fn dense_f64(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .to_f64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    PipelineError::InvalidArgument(format!(
                        "column '{}' has a missing value at row {}",
                        name, row
                    ))
                })
            })
            .collect()
    }
}
