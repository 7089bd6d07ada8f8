//! Normalizes date/time columns to integer nanoseconds.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::preprocessing::Preprocessor;
use crate::table::{io, Column, ColumnData};

/// Columns converted when present.
pub const DATETIME_COLUMNS: [&str; 4] = ["date", "actual_offblock_time", "arrival_time", "valid"];

/// Nanoseconds since the epoch for every row of a date/time column.
///
/// Accepts timestamp, integer (already nanoseconds) and string columns.
pub(crate) fn nanos(column: &Column) -> Result<Vec<Option<i64>>> {
    match column.data() {
        ColumnData::Timestamp(v) | ColumnData::Int(v) => Ok(v.clone()),
        ColumnData::Str(v) => v
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                None => Ok(None),
                Some(raw) => io::parse_timestamp(raw).map(Some).ok_or_else(|| {
                    PipelineError::InvalidArgument(format!(
                        "column '{}' row {}: cannot parse '{}' as a date/time",
                        column.name(),
                        row,
                        raw
                    ))
                }),
            })
            .collect(),
        _ => Err(PipelineError::TypeMismatch {
            column: column.name().to_string(),
            expected: "timestamp".to_string(),
            got: column.dtype().to_string(),
        }),
    }
}

/// Converts [`DATETIME_COLUMNS`] to `Int` nanoseconds so downstream numeric
/// code can use them directly.
#[derive(Debug, Clone, Default)]
pub struct CleanDatasetPreprocessor;

impl CleanDatasetPreprocessor {
    pub fn new() -> Self {
        Self
    }
}

impl Preprocessor for CleanDatasetPreprocessor {
    fn name(&self) -> &str {
        "clean_dataset"
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        for name in DATETIME_COLUMNS {
            if !dataset.table.has_column(name) {
                continue;
            }
            let values = nanos(dataset.table.column(name)?)?;
            dataset.table.insert_column(Column::int(name, values))?;
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{DType, Table};

    #[test]
    fn test_converts_present_columns_only() {
        let table = Table::from_columns(vec![
            Column::from_strs("date", &["2022-01-01", "2022-01-02"]),
            Column::str(
                "actual_offblock_time",
                vec![Some("2022-01-01T10:00:00Z".into()), None],
            ),
            Column::from_f64s("tow", &[1.0, 2.0]),
        ])
        .unwrap();
        let out = CleanDatasetPreprocessor::new()
            .process(Dataset::new(table, "d"))
            .unwrap();

        let date = out.table.column("date").unwrap();
        assert_eq!(date.dtype(), DType::Int);
        assert_eq!(date.as_int().unwrap()[0], Some(1_640_995_200_000_000_000));
        assert_eq!(
            out.table.column("actual_offblock_time").unwrap().as_int().unwrap()[1],
            None
        );
        assert!(!out.table.has_column("arrival_time"));
        assert_eq!(out.table.column("tow").unwrap().dtype(), DType::Float);
    }

    #[test]
    fn test_is_idempotent() {
        let table = Table::from_columns(vec![Column::from_strs("date", &["2022-03-04"])]).unwrap();
        let once = CleanDatasetPreprocessor.process(Dataset::new(table, "d")).unwrap();
        let twice = CleanDatasetPreprocessor.process(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unparseable_value_fails() {
        let table = Table::from_columns(vec![Column::from_strs("date", &["soon"])]).unwrap();
        assert!(CleanDatasetPreprocessor.process(Dataset::new(table, "d")).is_err());
    }
}
