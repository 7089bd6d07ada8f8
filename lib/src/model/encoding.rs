//! Conversion of typed table columns into a dense feature matrix.
//!
//! Encodings are learned once, on the training table, and reused unchanged
//! for every later prediction table. String columns become ordinal codes
//! over their sorted distinct values; numeric, boolean and timestamp columns
//! are used as numbers with missing cells filled by the training mean.

use crate::error::{PipelineError, Result};
use crate::table::{Column, DType, Table};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Code assigned to missing and unseen categories.
pub const UNKNOWN_CODE: f64 = -1.0;

/// What to do with a category that was not seen during fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Fail the transform.
    Error,
    /// Encode as [`UNKNOWN_CODE`].
    #[default]
    UseEncodedValue,
}

/// Maps each distinct category to its rank among the sorted categories.
#[derive(Clone, Debug, Default)]
pub struct OrdinalEncoder {
    handle_unknown: HandleUnknown,
}

impl OrdinalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }

    /// Learns the categories of `column`. Missing cells are not categories.
    pub fn fit(&self, column: &Column) -> FittedOrdinalEncoder {
        let categories: Vec<String> = (0..column.len())
            .filter_map(|row| column.key(row))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        FittedOrdinalEncoder::new(categories, self.handle_unknown)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "OrdinalEncoderParams", into = "OrdinalEncoderParams")]
pub struct FittedOrdinalEncoder {
    categories: Vec<String>,
    mapping: HashMap<String, usize>,
    handle_unknown: HandleUnknown,
}

/// Persisted form; the lookup map is rebuilt on load.
#[derive(Clone, Serialize, Deserialize)]
struct OrdinalEncoderParams {
    categories: Vec<String>,
    handle_unknown: HandleUnknown,
}

impl From<OrdinalEncoderParams> for FittedOrdinalEncoder {
    fn from(params: OrdinalEncoderParams) -> Self {
        Self::new(params.categories, params.handle_unknown)
    }
}

impl From<FittedOrdinalEncoder> for OrdinalEncoderParams {
    fn from(fitted: FittedOrdinalEncoder) -> Self {
        Self {
            categories: fitted.categories,
            handle_unknown: fitted.handle_unknown,
        }
    }
}

impl FittedOrdinalEncoder {
    fn new(categories: Vec<String>, handle_unknown: HandleUnknown) -> Self {
        let mapping = categories
            .iter()
            .enumerate()
            .map(|(code, category)| (category.clone(), code))
            .collect();
        Self {
            categories,
            mapping,
            handle_unknown,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn code(&self, category: &str) -> Option<usize> {
        self.mapping.get(category).copied()
    }

    pub fn transform(&self, column: &Column) -> Result<Vec<f64>> {
        (0..column.len())
            .map(|row| match column.key(row) {
                None => Ok(UNKNOWN_CODE),
                Some(key) => match (self.code(&key), self.handle_unknown) {
                    (Some(code), _) => Ok(code as f64),
                    (None, HandleUnknown::UseEncodedValue) => Ok(UNKNOWN_CODE),
                    (None, HandleUnknown::Error) => Err(PipelineError::InvalidArgument(format!(
                        "unknown category '{}' in column '{}'",
                        key,
                        column.name()
                    ))),
                },
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum ColumnEncoding {
    Numeric { fill: f64 },
    Categorical(FittedOrdinalEncoder),
}

/// Train-time encoding plan for every feature column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    columns: Vec<(String, ColumnEncoding)>,
}

impl FeatureEncoder {
    /// Learns encodings for every column of `table` not listed in `exclude`.
    pub fn fit(table: &Table, exclude: &[&str]) -> Result<Self> {
        let encoder = OrdinalEncoder::new();
        let mut columns = Vec::new();
        for column in table.columns() {
            if exclude.contains(&column.name()) {
                continue;
            }
            let encoding = match column.dtype() {
                DType::Str => ColumnEncoding::Categorical(encoder.fit(column)),
                _ => {
                    let present: Vec<f64> = column.to_f64()?.into_iter().flatten().collect();
                    let fill = if present.is_empty() {
                        0.0
                    } else {
                        present.iter().sum::<f64>() / present.len() as f64
                    };
                    ColumnEncoding::Numeric { fill }
                }
            };
            columns.push((column.name().to_string(), encoding));
        }
        Ok(Self { columns })
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Builds the `(rows, features)` matrix for `table`.
    ///
    /// # Errors
    /// `MissingColumn` if a training feature is absent, `TypeMismatch` if a
    /// numeric feature arrives as strings.
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        let n = table.n_rows();
        let mut matrix = Array2::<f64>::zeros((n, self.columns.len()));
        for (j, (name, encoding)) in self.columns.iter().enumerate() {
            let column = table.column(name)?;
            let values: Vec<f64> = match encoding {
                ColumnEncoding::Numeric { fill } => column
                    .to_f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()).unwrap_or(*fill))
                    .collect(),
                ColumnEncoding::Categorical(fitted) => fitted.transform(column)?,
            };
            for (i, v) in values.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training() -> Table {
        Table::from_columns(vec![
            Column::from_strs("flight_id", &["a", "b", "c"]),
            Column::from_strs("adep", &["LFPG", "EGLL", "LFPG"]),
            Column::float("flown_distance", vec![Some(100.0), None, Some(300.0)]),
            Column::bool("is_week_day", vec![Some(true), Some(false), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_ordinal_codes_are_sorted() {
        let fitted = OrdinalEncoder::new().fit(training().column("adep").unwrap());
        assert_eq!(fitted.categories(), &["EGLL".to_string(), "LFPG".to_string()]);
        assert_eq!(fitted.code("LFPG"), Some(1));
    }

    #[test]
    fn test_unknown_category_handling() {
        let fitted = OrdinalEncoder::new().fit(&Column::from_strs("adep", &["EGLL"]));
        let col = Column::str("adep", vec![Some("EGLL".into()), Some("KJFK".into()), None]);
        assert_eq!(fitted.transform(&col).unwrap(), vec![0.0, -1.0, -1.0]);

        let strict = OrdinalEncoder::new()
            .with_handle_unknown(HandleUnknown::Error)
            .fit(&Column::from_strs("adep", &["EGLL"]));
        assert!(strict.transform(&col).is_err());
    }

    #[test]
    fn test_feature_matrix_uses_train_time_encodings() {
        let encoder = FeatureEncoder::fit(&training(), &["flight_id"]).unwrap();
        assert_eq!(encoder.feature_names(), vec!["adep", "flown_distance", "is_week_day"]);

        let x = encoder.transform(&training()).unwrap();
        assert_eq!(x.shape(), &[3, 3]);
        assert_eq!(x[[0, 0]], 1.0);
        assert_eq!(x[[1, 1]], 200.0);
        assert_eq!(x[[2, 2]], 0.5);

        // A prediction table with only one category must keep the training codes.
        let later = Table::from_columns(vec![
            Column::from_strs("adep", &["LFPG"]),
            Column::from_f64s("flown_distance", &[50.0]),
            Column::bool("is_week_day", vec![Some(true)]),
        ])
        .unwrap();
        let x = encoder.transform(&later).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![1.0, 50.0, 1.0]);
    }

    #[test]
    fn test_missing_feature_column() {
        let encoder = FeatureEncoder::fit(&training(), &["flight_id"]).unwrap();
        let table = Table::from_columns(vec![Column::from_strs("adep", &["LFPG"])]).unwrap();
        assert!(matches!(
            encoder.transform(&table),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_encoder_serde_round_trip() {
        let encoder = FeatureEncoder::fit(&training(), &[]).unwrap();
        let json = serde_json::to_string(&encoder).unwrap();
        let back: FeatureEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoder);
    }
}
