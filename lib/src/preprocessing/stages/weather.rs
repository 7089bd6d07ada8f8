//! Surface weather observations at the departure airport.
//!
//! Observations are fetched once per distinct station through an
//! [`ObservationSource`]. Each flight is matched to the latest observation at
//! or before its off-block time, provided it is no older than the window.

use super::clean::nanos;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::preprocessing::cache::content_fingerprint;
use crate::preprocessing::pool::WorkerPool;
use crate::preprocessing::retry::{or_placeholder, RetryPolicy};
use crate::preprocessing::Preprocessor;
use crate::table::{io, Column, DType, Table, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Observation timestamp column.
pub const OBSERVATION_TIME: &str = "valid";

pub const DEFAULT_WEATHER_FIELDS: [&str; 8] =
    ["tmpf", "dwpf", "relh", "drct", "sknt", "alti", "vsby", "gust"];

/// Supplies the observation table of one station.
///
/// The table must have a [`OBSERVATION_TIME`] column. Implementations report
/// retryable failures as [`PipelineError::Transient`].
pub trait ObservationSource: Send + Sync {
    fn fetch(&self, station: &str) -> Result<Table>;

    /// Identifies the source in cache keys.
    fn describe(&self) -> String;
}

/// Reads `<dir>/<station>.csv`. A station without a file has no observations.
#[derive(Debug, Clone)]
pub struct CsvObservationSource {
    dir: PathBuf,
}

impl CsvObservationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ObservationSource for CsvObservationSource {
    fn fetch(&self, station: &str) -> Result<Table> {
        let path = self.dir.join(format!("{}.csv", station));
        if !path.exists() {
            debug!(station, "no observation file");
            return Ok(Table::new());
        }
        match io::read_csv(&path) {
            Err(PipelineError::Io(e)) => Err(PipelineError::Transient(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
            other => other,
        }
    }

    fn describe(&self) -> String {
        format!("csv:{}:{}", self.dir.display(), content_fingerprint(&self.dir))
    }
}

/// Observations of one station sorted by time.
struct StationSeries {
    times: Vec<i64>,
    rows: Vec<usize>,
    table: Table,
}

impl StationSeries {
    fn new(table: Table) -> Result<Self> {
        if table.n_cols() == 0 {
            return Ok(Self {
                times: Vec::new(),
                rows: Vec::new(),
                table,
            });
        }
        let mut timed: Vec<(i64, usize)> = nanos(table.column(OBSERVATION_TIME)?)?
            .into_iter()
            .enumerate()
            .filter_map(|(row, t)| t.map(|t| (t, row)))
            .collect();
        timed.sort_unstable();
        Ok(Self {
            times: timed.iter().map(|(t, _)| *t).collect(),
            rows: timed.iter().map(|(_, r)| *r).collect(),
            table,
        })
    }

    /// Row of the latest observation in `[at - window, at]`.
    fn latest_at(&self, at: i64, window: i64) -> Option<usize> {
        let idx = self.times.partition_point(|&t| t <= at).checked_sub(1)?;
        (at - self.times[idx] <= window).then(|| self.rows[idx])
    }
}

/// Adds `wx_<field>` columns for the departure station's weather.
pub struct WeatherPreprocessor {
    source: Arc<dyn ObservationSource>,
    fields: Vec<String>,
    station_column: String,
    time_column: String,
    window: Duration,
    retry: RetryPolicy,
    pool: Option<Arc<WorkerPool>>,
}

impl WeatherPreprocessor {
    pub fn new(source: Arc<dyn ObservationSource>) -> Self {
        Self {
            source,
            fields: DEFAULT_WEATHER_FIELDS.iter().map(|f| f.to_string()).collect(),
            station_column: "adep".to_string(),
            time_column: "actual_offblock_time".to_string(),
            window: Duration::from_secs(2 * 3600),
            retry: RetryPolicy::default(),
            pool: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    fn fetch_station(&self, station: &str) -> Result<StationSeries> {
        let table = or_placeholder(&self.retry, station, || self.source.fetch(station))?;
        StationSeries::new(table)
    }

    /// Series per station, keyed in station order.
    fn fetch_all(&self, stations: BTreeSet<String>) -> Result<BTreeMap<String, StationSeries>> {
        match &self.pool {
            Some(pool) => Ok(pool
                .map_keyed(
                    stations.into_iter().map(|s| (s.clone(), s)).collect(),
                    |station| self.fetch_station(&station),
                )?
                .into_iter()
                .collect()),
            None => stations
                .into_iter()
                .map(|s| {
                    let series = self.fetch_station(&s)?;
                    Ok((s, series))
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for WeatherPreprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherPreprocessor")
            .field("source", &self.source.describe())
            .field("fields", &self.fields)
            .field("window", &self.window)
            .finish()
    }
}

impl Preprocessor for WeatherPreprocessor {
    fn name(&self) -> &str {
        "weather"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source.describe(),
            "fields": self.fields,
            "station_column": self.station_column,
            "time_column": self.time_column,
            "window_secs": self.window.as_secs(),
        })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let stations_col = dataset.table.column(&self.station_column)?;
        let times = nanos(dataset.table.column(&self.time_column)?)?;
        let n = dataset.len();

        let stations: Vec<Option<String>> = (0..n).map(|r| stations_col.key(r)).collect();
        let distinct: BTreeSet<String> = stations.iter().flatten().cloned().collect();
        info!(stations = distinct.len(), "fetching weather observations");
        let series = self.fetch_all(distinct)?;

        let window = i64::try_from(self.window.as_nanos()).unwrap_or(i64::MAX);
        let matches: Vec<Option<(&StationSeries, usize)>> = stations
            .iter()
            .zip(&times)
            .map(|(station, at)| {
                let s = series.get(station.as_ref()?)?;
                s.latest_at((*at)?, window).map(|row| (s, row))
            })
            .collect();
        let matched = matches.iter().filter(|m| m.is_some()).count();

        // Type inference runs per station file, so one station may read a
        // field as Int where another reads Float.
        let mut columns = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let dtype = series
                .values()
                .filter_map(|s| s.table.column(field).ok().map(Column::dtype))
                .reduce(DType::unify)
                .unwrap_or(DType::Float);
            let values = matches
                .iter()
                .map(|m| match m {
                    Some((s, row)) => s
                        .table
                        .column(field)
                        .map(|c| c.value(*row))
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                })
                .collect();
            columns.push(Column::from_values(format!("wx_{}", field), dtype, values));
        }
        debug!(rows = n, matched, "weather observations matched");

        for column in columns {
            dataset.table.insert_column(column)?;
        }
        Ok(dataset)
    }
}
