//! Calendar features derived from the flight date.

use super::clean::nanos;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::preprocessing::Preprocessor;
use crate::table::Column;
use chrono::{DateTime, Datelike, Utc};

/// Adds `day`, `month`, `year`, `day_of_week` (Monday = 0), `quarter`,
/// `week` (ISO week number) and `is_week_day` from the `date` column.
#[derive(Debug, Clone)]
pub struct DerivedFeaturePreprocessor {
    date_column: String,
}

impl Default for DerivedFeaturePreprocessor {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
        }
    }
}

impl DerivedFeaturePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }
}

impl Preprocessor for DerivedFeaturePreprocessor {
    fn name(&self) -> &str {
        "derived_features"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "date_column": self.date_column })
    }

    fn process(&self, mut dataset: Dataset) -> Result<Dataset> {
        let dates: Vec<Option<DateTime<Utc>>> = nanos(dataset.table.column(&self.date_column)?)?
            .into_iter()
            .map(|ns| ns.map(DateTime::<Utc>::from_timestamp_nanos))
            .collect();

        let int_feature = |f: fn(&DateTime<Utc>) -> i64| -> Vec<Option<i64>> {
            dates.iter().map(|d| d.as_ref().map(f)).collect()
        };

        let day_of_week = int_feature(|d| i64::from(d.weekday().num_days_from_monday()));
        let is_week_day = day_of_week.iter().map(|d| d.map(|d| d < 5)).collect();

        let table = &mut dataset.table;
        table.insert_column(Column::int("day", int_feature(|d| i64::from(d.day()))))?;
        table.insert_column(Column::int("month", int_feature(|d| i64::from(d.month()))))?;
        table.insert_column(Column::int("year", int_feature(|d| i64::from(d.year()))))?;
        table.insert_column(Column::int(
            "quarter",
            int_feature(|d| i64::from((d.month() - 1) / 3 + 1)),
        ))?;
        table.insert_column(Column::int(
            "week",
            int_feature(|d| i64::from(d.iso_week().week())),
        ))?;
        table.insert_column(Column::int("day_of_week", day_of_week))?;
        table.insert_column(Column::bool("is_week_day", is_week_day))?;
        Ok(dataset)
    }
}
