//! Monthly passenger traffic at departure and destination airports.

use super::clean::nanos;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::reference::ReferenceTable;
use crate::preprocessing::Preprocessor;
use crate::table::{io, Column, Table};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Reporting airport, `<country>_<icao>` (e.g. `AT_LOWW`).
pub const STATS_AIRPORT: &str = "rep_airp";
/// Reporting month, `YYYY-MM`.
pub const STATS_PERIOD: &str = "TIME_PERIOD";
pub const STATS_VALUE: &str = "OBS_VALUE";
/// Columns whose combination names one measure.
pub const STATS_DIMENSIONS: [&str; 3] = ["unit", "tra_meas", "airline"];

const STATS_KEY: &str = "airport_month";

/// Joins monthly traffic statistics on the airport and month of each flight.
///
/// Every `<unit>_<tra_meas>_<airline>` combination in the statistics becomes
/// a `stats_adep_*` and a `stats_ades_*` column; repeated observations of one
/// combination are averaged. Flights outside the reported airports or months
/// get missing values.
#[derive(Debug, Clone)]
pub struct PaxFlowPreprocessor {
    path: PathBuf,
    date_column: String,
}

impl PaxFlowPreprocessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            date_column: "date".to_string(),
        }
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    fn column<'a>(&self, stats: &'a Table, name: &str) -> Result<&'a Column> {
        stats.column(name).map_err(|_| {
            PipelineError::Config(format!(
                "passenger statistics {} have no '{}' column",
                self.path.display(),
                name
            ))
        })
    }

    /// One row per (airport, month), one column per measure.
    fn monthly(&self) -> Result<ReferenceTable> {
        let stats = io::read_csv(&self.path)?;
        let airports = self.column(&stats, STATS_AIRPORT)?;
        let periods = self.column(&stats, STATS_PERIOD)?;
        let values = self.column(&stats, STATS_VALUE)?.to_f64()?;
        let dimensions = STATS_DIMENSIONS
            .iter()
            .map(|d| self.column(&stats, d))
            .collect::<Result<Vec<_>>>()?;

        let mut measures = BTreeSet::new();
        let mut sums: BTreeMap<String, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
        for row in 0..stats.n_rows() {
            let (Some(airport), Some(period), Some(value)) =
                (airports.key(row), periods.key(row), values[row])
            else {
                continue;
            };
            let Some(parts) = dimensions
                .iter()
                .map(|d| d.key(row))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let measure = parts.join("_");
            let slot = sums
                .entry(format!("{}|{}", airport, period))
                .or_default()
                .entry(measure.clone())
                .or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
            measures.insert(measure);
        }
        debug!(
            airport_months = sums.len(),
            measures = measures.len(),
            "aggregated passenger statistics"
        );

        let mut columns = vec![Column::str(
            STATS_KEY,
            sums.keys().map(|k| Some(k.clone())).collect(),
        )];
        for measure in &measures {
            columns.push(Column::float(
                measure.as_str(),
                sums.values()
                    .map(|by_measure| by_measure.get(measure).map(|(sum, n)| sum / *n as f64))
                    .collect(),
            ));
        }
        ReferenceTable::from_table(Table::from_columns(columns)?, STATS_KEY)
    }
}

impl Preprocessor for PaxFlowPreprocessor {
    fn name(&self) -> &str {
        "pax_flow"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.display().to_string(),
            "content": content_fingerprint(&self.path),
            "date_column": self.date_column,
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let monthly = self.monthly()?;
        let measures = monthly.value_columns();
        let months: Vec<Option<String>> = nanos(dataset.table.column(&self.date_column)?)?
            .into_iter()
            .map(|ns| {
                ns.map(|ns| DateTime::<Utc>::from_timestamp_nanos(ns).format("%Y-%m").to_string())
            })
            .collect();

        for side in ["adep", "ades"] {
            let countries = dataset.table.column(&format!("country_code_{}", side))?;
            let airports = dataset.table.column(side)?;
            let keys: Vec<Option<String>> = months
                .iter()
                .enumerate()
                .map(|(row, month)| {
                    Some(format!(
                        "{}_{}|{}",
                        countries.key(row)?,
                        airports.key(row)?,
                        month.as_deref()?
                    ))
                })
                .collect();
            let lookup = monthly.lookup(
                &Column::str(STATS_KEY, keys),
                &measures,
                &format!("stats_{}_", side),
                None,
            )?;
            if lookup.misses > 0 {
                warn!(side, misses = lookup.misses, "no passenger statistics for airport month");
            }
            for column in lookup.columns {
                dataset.table.insert_column(column)?;
            }
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATS: &str = "\
rep_airp,TIME_PERIOD,unit,tra_meas,airline,OBS_VALUE
GB_EGLL,2022-01,PAS,PAS_CRD,TOTAL,1000
GB_EGLL,2022-01,PAS,PAS_CRD,TOTAL,1200
GB_EGLL,2022-01,FLIGHT,CAF_PAS,TOTAL,30
FR_LFPG,2022-01,PAS,PAS_CRD,TOTAL,900
FR_LFPG,2022-02,PAS,PAS_CRD,TOTAL,950
";

    fn flights() -> Dataset {
        let table = Table::from_columns(vec![
            Column::from_strs("date", &["2022-01-03", "2022-02-10", "2022-01-20"]),
            Column::from_strs("adep", &["EGLL", "LFPG", "KJFK"]),
            Column::from_strs("ades", &["LFPG", "EGLL", "EGLL"]),
            Column::from_strs("country_code_adep", &["GB", "FR", "US"]),
            Column::from_strs("country_code_ades", &["FR", "GB", "GB"]),
        ])
        .unwrap();
        Dataset::new(table, "flights")
    }

    #[test]
    fn test_monthly_measures_for_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pax.csv");
        std::fs::write(&path, STATS).unwrap();

        let out = PaxFlowPreprocessor::new(&path).process(flights()).unwrap();
        let col = |name: &str| out.table.column(name).unwrap().to_f64().unwrap();

        // repeated observations are averaged
        assert_eq!(
            col("stats_adep_PAS_PAS_CRD_TOTAL"),
            vec![Some(1100.0), Some(950.0), None]
        );
        assert_eq!(col("stats_adep_FLIGHT_CAF_PAS_TOTAL"), vec![Some(30.0), None, None]);
        // EGLL reports nothing for February
        assert_eq!(
            col("stats_ades_PAS_PAS_CRD_TOTAL"),
            vec![Some(900.0), None, Some(1100.0)]
        );
    }

    #[test]
    fn test_missing_inputs_are_config_errors() {
        let err = PaxFlowPreprocessor::new("/no/pax.csv")
            .process(flights())
            .unwrap_err();
        assert!(err.is_config());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pax.csv");
        std::fs::write(&path, "rep_airp,TIME_PERIOD,OBS_VALUE\nGB_EGLL,2022-01,1\n").unwrap();
        let err = PaxFlowPreprocessor::new(&path).process(flights()).unwrap_err();
        assert!(err.is_config());
    }
}
