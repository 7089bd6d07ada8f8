//! CSV reading and writing for [`Table`].
//!
//! Column types are inferred from the non-empty cells of each column, trying
//! `Int`, `Float`, `Bool`, `Timestamp` and finally `Str`. Empty cells are
//! missing values.

use super::{Column, ColumnData, Table, Value};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::Path;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a timestamp string into nanoseconds since the epoch (UTC).
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.timestamp_nanos_opt();
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return ts.and_utc().timestamp_nanos_opt();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|ts| ts.and_utc().timestamp_nanos_opt())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn infer_column(name: &str, cells: Vec<String>) -> Column {
    let present: Vec<&str> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    fn cells_as<T>(cells: &[String], parse: impl Fn(&str) -> Option<T>) -> Vec<Option<T>> {
        cells
            .iter()
            .map(|c| {
                let c = c.trim();
                if c.is_empty() {
                    None
                } else {
                    parse(c)
                }
            })
            .collect()
    }

    let data = if present.is_empty() {
        ColumnData::Float(vec![None; cells.len()])
    } else if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        ColumnData::Int(cells_as(&cells, |c| c.parse().ok()))
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        ColumnData::Float(cells_as(&cells, |c| c.parse().ok()))
    } else if present.iter().all(|c| parse_bool(c).is_some()) {
        ColumnData::Bool(cells_as(&cells, parse_bool))
    } else if present.iter().all(|c| parse_timestamp(c).is_some()) {
        ColumnData::Timestamp(cells_as(&cells, parse_timestamp))
    } else {
        ColumnData::Str(cells_as(&cells, |c| Some(c.to_string())))
    };
    Column::new(name, data)
}

/// Reads a CSV table from any reader. The first record is the header.
pub fn read_csv_from<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        for (i, field) in record.iter().enumerate() {
            cells[i].push(field.to_string());
        }
    }

    Table::from_columns(
        headers
            .iter()
            .zip(cells)
            .map(|(name, col)| infer_column(name, col))
            .collect(),
    )
}

/// Reads a CSV file.
///
/// # Errors
/// [`PipelineError::Config`] if the file does not exist; CSV errors otherwise.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::Config(format!(
            "required file not found: {}",
            path.display()
        )));
    }
    let file = std::fs::File::open(path)?;
    read_csv_from(std::io::BufReader::new(file))
}

/// Writes a table as CSV with a header row. Missing values are empty cells.
pub fn write_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.column_names())?;
    for row in 0..table.n_rows() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|c| c.value(row).to_string())
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `(flight_id, tow)` prediction pairs, one row per input row.
pub fn write_predictions<P: AsRef<Path>>(
    path: P,
    ids: &Column,
    predictions: &[f64],
) -> Result<()> {
    if ids.len() != predictions.len() {
        return Err(PipelineError::InvalidArgument(format!(
            "{} identifiers but {} predictions",
            ids.len(),
            predictions.len()
        )));
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["flight_id", "tow"])?;
    for (row, prediction) in predictions.iter().enumerate() {
        let id = match ids.value(row) {
            Value::Null => String::new(),
            v => v.to_string(),
        };
        wtr.write_record([id, prediction.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DType;

    const SAMPLE: &str = "\
flight_id,date,adep,flown_distance,is_cargo,tow
248763780,2022-01-01,EGLL,1234.5,false,61000
248760618,2022-01-02,LFPG,,true,
";

    #[test]
    fn test_type_inference() {
        let table = read_csv_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column("flight_id").unwrap().dtype(), DType::Int);
        assert_eq!(table.column("date").unwrap().dtype(), DType::Timestamp);
        assert_eq!(table.column("adep").unwrap().dtype(), DType::Str);
        assert_eq!(table.column("flown_distance").unwrap().dtype(), DType::Float);
        assert_eq!(table.column("is_cargo").unwrap().dtype(), DType::Bool);
        assert_eq!(table.column("tow").unwrap().dtype(), DType::Int);
        assert!(table.column("tow").unwrap().is_null(1));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2022-01-01T10:00:00Z").unwrap();
        let b = parse_timestamp("2022-01-01 10:00:00").unwrap();
        let c = parse_timestamp("2022-01-01T10:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = read_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flights.csv");
        let table = read_csv_from(SAMPLE.as_bytes()).unwrap();
        write_csv(&table, &path).unwrap();
        let back = read_csv(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_write_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.csv");
        let ids = Column::from_strs("flight_id", &["a", "b"]);
        write_predictions(&path, &ids, &[1.5, 2.0]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "flight_id,tow\na,1.5\nb,2\n");

        assert!(write_predictions(&path, &ids, &[1.0]).is_err());
    }
}
