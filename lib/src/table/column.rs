//! Named, typed columns with per-cell missing values.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Logical type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Float,
    Int,
    Bool,
    Str,
    /// UTC instant stored as nanoseconds since the Unix epoch.
    Timestamp,
}

impl DType {
    /// Narrowest type that holds values of both `self` and `other`: numeric
    /// types widen to `Float`, anything else falls back to `Str`.
    pub fn unify(self, other: DType) -> DType {
        use DType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int | Float | Bool, Int | Float | Bool) => Float,
            _ => Str,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float => "float",
            DType::Int => "int",
            DType::Bool => "bool",
            DType::Str => "str",
            DType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Storage for a column. `None` marks a missing cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    Timestamp(Vec<Option<i64>>),
}

/// A single cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) | Value::Timestamp(v) => Some(*v as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Str(_) => None,
        }
    }

    /// String form used as a join key. Missing values have no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Int(v) | Value::Timestamp(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Bool(b) => Some(b.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::Timestamp(ns) => {
                let ts = DateTime::<Utc>::from_timestamp_nanos(*ns);
                write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

/// A named column of a [`Table`](super::Table).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data: ColumnData,
}

fn gather<T: Clone>(values: &[Option<T>], indices: &[usize]) -> Vec<Option<T>> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

fn keep<T: Clone>(values: &[Option<T>], mask: &[bool]) -> Vec<Option<T>> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, m)| **m)
        .map(|(v, _)| v.clone())
        .collect()
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Float(values))
    }

    pub fn int(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnData::Int(values))
    }

    pub fn bool(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self::new(name, ColumnData::Bool(values))
    }

    pub fn str(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Str(values))
    }

    pub fn timestamp(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnData::Timestamp(values))
    }

    /// Dense float column without missing values.
    pub fn from_f64s(name: impl Into<String>, values: &[f64]) -> Self {
        Self::float(name, values.iter().map(|&v| Some(v)).collect())
    }

    /// Dense string column without missing values.
    pub fn from_strs(name: impl Into<String>, values: &[&str]) -> Self {
        Self::str(name, values.iter().map(|v| Some(v.to_string())).collect())
    }

    /// An all-missing column of the given type.
    pub fn nulls(name: impl Into<String>, dtype: DType, len: usize) -> Self {
        let data = match dtype {
            DType::Float => ColumnData::Float(vec![None; len]),
            DType::Int => ColumnData::Int(vec![None; len]),
            DType::Bool => ColumnData::Bool(vec![None; len]),
            DType::Str => ColumnData::Str(vec![None; len]),
            DType::Timestamp => ColumnData::Timestamp(vec![None; len]),
        };
        Self::new(name, data)
    }

    /// Builds a column of `dtype` from cell values.
    ///
    /// Numeric cells widen into a `Float` column and any cell renders into a
    /// `Str` column. Cells that cannot be represented become missing and are
    /// reported with a warning.
    pub fn from_values(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Self {
        let present = values.iter().filter(|v| !v.is_null()).count();
        let data = match dtype {
            DType::Float => ColumnData::Float(values.iter().map(Value::as_f64).collect()),
            DType::Int => ColumnData::Int(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Int(i) => Some(i),
                        _ => None,
                    })
                    .collect(),
            ),
            DType::Bool => ColumnData::Bool(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect(),
            ),
            DType::Str => ColumnData::Str(values.iter().map(Value::as_key).collect()),
            DType::Timestamp => ColumnData::Timestamp(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Timestamp(t) => Some(t),
                        _ => None,
                    })
                    .collect(),
            ),
        };
        let column = Self::new(name, data);
        let dropped = present.saturating_sub(column.len() - column.null_count());
        if dropped > 0 {
            warn!(
                column = column.name(),
                dtype = %dtype,
                dropped,
                "cells of another type became missing"
            );
        }
        column
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        match self.data {
            ColumnData::Float(_) => DType::Float,
            ColumnData::Int(_) => DType::Int,
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::Str(_) => DType::Str,
            ColumnData::Timestamp(_) => DType::Timestamp,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Str(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, row: usize) -> Value {
        match &self.data {
            ColumnData::Float(v) => v[row].map_or(Value::Null, Value::Float),
            ColumnData::Int(v) => v[row].map_or(Value::Null, Value::Int),
            ColumnData::Bool(v) => v[row].map_or(Value::Null, Value::Bool),
            ColumnData::Str(v) => v[row].clone().map_or(Value::Null, Value::Str),
            ColumnData::Timestamp(v) => v[row].map_or(Value::Null, Value::Timestamp),
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.value(row).is_null()
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&r| self.is_null(r)).count()
    }

    /// Join key of a row (string form of the cell), `None` when missing.
    pub fn key(&self, row: usize) -> Option<String> {
        self.value(row).as_key()
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Float(v) => ColumnData::Float(gather(v, indices)),
            ColumnData::Int(v) => ColumnData::Int(gather(v, indices)),
            ColumnData::Bool(v) => ColumnData::Bool(gather(v, indices)),
            ColumnData::Str(v) => ColumnData::Str(gather(v, indices)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(gather(v, indices)),
        };
        Column::new(self.name.clone(), data)
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Column {
        let data = match &self.data {
            ColumnData::Float(v) => ColumnData::Float(keep(v, mask)),
            ColumnData::Int(v) => ColumnData::Int(keep(v, mask)),
            ColumnData::Bool(v) => ColumnData::Bool(keep(v, mask)),
            ColumnData::Str(v) => ColumnData::Str(keep(v, mask)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(keep(v, mask)),
        };
        Column::new(self.name.clone(), data)
    }

    fn mismatch(&self, expected: &str) -> PipelineError {
        PipelineError::TypeMismatch {
            column: self.name.clone(),
            expected: expected.to_string(),
            got: self.dtype().to_string(),
        }
    }

    /// Numeric view. Bools map to 0/1 and timestamps to nanoseconds.
    pub fn to_f64(&self) -> Result<Vec<Option<f64>>> {
        match &self.data {
            ColumnData::Float(v) => Ok(v.clone()),
            ColumnData::Int(v) | ColumnData::Timestamp(v) => {
                Ok(v.iter().map(|x| x.map(|i| i as f64)).collect())
            }
            ColumnData::Bool(v) => Ok(v
                .iter()
                .map(|x| x.map(|b| if b { 1.0 } else { 0.0 }))
                .collect()),
            ColumnData::Str(_) => Err(self.mismatch("numeric")),
        }
    }

    pub fn as_str(&self) -> Result<&[Option<String>]> {
        match &self.data {
            ColumnData::Str(v) => Ok(v),
            _ => Err(self.mismatch("str")),
        }
    }

    pub fn as_int(&self) -> Result<&[Option<i64>]> {
        match &self.data {
            ColumnData::Int(v) => Ok(v),
            _ => Err(self.mismatch("int")),
        }
    }

    pub fn as_timestamps(&self) -> Result<&[Option<i64>]> {
        match &self.data {
            ColumnData::Timestamp(v) => Ok(v),
            _ => Err(self.mismatch("timestamp")),
        }
    }
}
