//! Keyed reference tables (airports, aircraft, fuel prices) and left joins
//! against them.

use super::pool::WorkerPool;
use crate::error::{PipelineError, Result};
use crate::table::{io, Column, Table, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// A table indexed by a unique key column.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    table: Table,
    key: String,
    rows: HashMap<String, usize>,
}

/// Outcome of a lookup: the new columns plus how many keyed rows found no match.
#[derive(Debug)]
pub struct Lookup {
    pub columns: Vec<Column>,
    pub misses: usize,
    pub unmatched: BTreeSet<String>,
}

impl ReferenceTable {
    /// Loads a reference CSV.
    ///
    /// # Errors
    /// [`PipelineError::Config`] when the file or its key column is missing,
    /// [`PipelineError::DuplicateKey`] when the key repeats.
    pub fn load<P: AsRef<Path>>(path: P, key: &str) -> Result<Self> {
        let path = path.as_ref();
        let table = io::read_csv(path)?;
        if !table.has_column(key) {
            return Err(PipelineError::Config(format!(
                "reference table {} has no '{}' column",
                path.display(),
                key
            )));
        }
        debug!(path = %path.display(), rows = table.n_rows(), "loaded reference table");
        Self::from_table(table, key)
    }

    pub fn from_table(table: Table, key: &str) -> Result<Self> {
        table.ensure_unique(key)?;
        let column = table.column(key)?;
        let rows = (0..table.n_rows())
            .filter_map(|row| column.key(row).map(|k| (k, row)))
            .collect();
        Ok(Self {
            table,
            key: key.to_string(),
            rows,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.table.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Every column except the key.
    pub fn value_columns(&self) -> Vec<&str> {
        self.table
            .column_names()
            .into_iter()
            .filter(|name| *name != self.key)
            .collect()
    }

    pub fn row_of(&self, key: &str) -> Option<usize> {
        self.rows.get(key).copied()
    }

    /// Resolves every row of `keys` against this table and returns `fields`
    /// as new columns named `<prefix><field>`. Rows with a missing or unknown
    /// key get missing values.
    ///
    /// With a `pool`, distinct keys are resolved on its workers.
    pub fn lookup(
        &self,
        keys: &Column,
        fields: &[&str],
        prefix: &str,
        pool: Option<&WorkerPool>,
    ) -> Result<Lookup> {
        let sources = fields
            .iter()
            .map(|f| self.table.column(f))
            .collect::<Result<Vec<_>>>()?;

        let distinct: BTreeSet<String> = (0..keys.len()).filter_map(|r| keys.key(r)).collect();
        let resolved: HashMap<String, Option<usize>> = match pool {
            Some(pool) => pool.map_keyed(
                distinct.into_iter().map(|k| (k.clone(), k)).collect(),
                |k| Ok(self.row_of(&k)),
            )?,
            None => distinct
                .into_iter()
                .map(|k| {
                    let row = self.row_of(&k);
                    (k, row)
                })
                .collect(),
        };

        let mut misses = 0;
        let mut unmatched = BTreeSet::new();
        let matches: Vec<Option<usize>> = (0..keys.len())
            .map(|r| {
                let key = keys.key(r)?;
                let row = resolved.get(&key).copied().flatten();
                if row.is_none() {
                    misses += 1;
                    unmatched.insert(key);
                }
                row
            })
            .collect();

        let columns = sources
            .iter()
            .map(|source| {
                let values = matches
                    .iter()
                    .map(|m| m.map_or(Value::Null, |row| source.value(row)))
                    .collect();
                Column::from_values(format!("{}{}", prefix, source.name()), source.dtype(), values)
            })
            .collect();

        Ok(Lookup {
            columns,
            misses,
            unmatched,
        })
    }

    /// Looks up `key_column` of `table` and inserts the resulting columns.
    /// Misses are logged, not fatal.
    pub fn join_into(
        &self,
        table: &mut Table,
        key_column: &str,
        fields: &[&str],
        prefix: &str,
        pool: Option<&WorkerPool>,
    ) -> Result<usize> {
        let lookup = self.lookup(table.column(key_column)?, fields, prefix, pool)?;
        if lookup.misses > 0 {
            warn!(
                key = key_column,
                misses = lookup.misses,
                unmatched = ?lookup.unmatched.iter().take(10).collect::<Vec<_>>(),
                "reference lookup misses"
            );
        }
        for column in lookup.columns {
            table.insert_column(column)?;
        }
        Ok(lookup.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DType;

    fn airports() -> ReferenceTable {
        let table = Table::from_columns(vec![
            Column::from_strs("ident", &["EGLL", "LFPG"]),
            Column::from_f64s("elevation_ft", &[83.0, 392.0]),
            Column::from_strs("municipality", &["London", "Paris"]),
        ])
        .unwrap();
        ReferenceTable::from_table(table, "ident").unwrap()
    }

    fn flights() -> Table {
        Table::from_columns(vec![Column::str(
            "adep",
            vec![
                Some("LFPG".into()),
                Some("ZZZZ".into()),
                None,
                Some("EGLL".into()),
            ],
        )])
        .unwrap()
    }

    #[test]
    fn test_lookup_fills_missing_for_unknown_keys() {
        let mut table = flights();
        let misses = airports()
            .join_into(&mut table, "adep", &["elevation_ft", "municipality"], "adep_", None)
            .unwrap();
        assert_eq!(misses, 1);

        let elevation = table.column("adep_elevation_ft").unwrap();
        assert_eq!(elevation.dtype(), DType::Float);
        assert_eq!(
            elevation.to_f64().unwrap(),
            vec![Some(392.0), None, None, Some(83.0)]
        );
        assert_eq!(
            table.column("adep_municipality").unwrap().key(3),
            Some("London".to_string())
        );
    }

    #[test]
    fn test_pool_and_serial_lookups_agree() {
        let pool = WorkerPool::new(2).unwrap();
        let keys = flights().column("adep").unwrap().clone();
        let serial = airports().lookup(&keys, &["elevation_ft"], "x_", None).unwrap();
        let parallel = airports().lookup(&keys, &["elevation_ft"], "x_", Some(&pool)).unwrap();
        assert_eq!(serial.columns, parallel.columns);
        assert_eq!(parallel.unmatched.into_iter().collect::<Vec<_>>(), vec!["ZZZZ"]);
    }

    #[test]
    fn test_unknown_field_is_missing_column() {
        let keys = flights().column("adep").unwrap().clone();
        let err = airports().lookup(&keys, &["runways"], "", None).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn test_duplicate_reference_keys_rejected() {
        let table = Table::from_columns(vec![Column::from_strs("ident", &["EGLL", "EGLL"])]).unwrap();
        assert!(matches!(
            ReferenceTable::from_table(table, "ident"),
            Err(PipelineError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_config() {
        let err = ReferenceTable::load("/no/such/airports.csv", "ident").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_value_columns_skip_key() {
        assert_eq!(airports().value_columns(), vec!["elevation_ft", "municipality"]);
    }
}
