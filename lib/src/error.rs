//! Error types for pipeline, model and evaluation operations.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Setup problem the pipeline cannot recover from (missing reference file,
    /// missing feature store, unreadable config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument passed to an operation (e.g. `split` fraction out of range).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A stage or model required a column that is not in the table.
    #[error("Missing column: '{column}'")]
    MissingColumn { column: String },

    /// A column exists but has the wrong type for the requested view.
    #[error("Type mismatch for column '{column}': expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: String,
        got: String,
    },

    /// A key column that must be unique contains a repeated value.
    #[error("Duplicate key '{key}' in column '{column}'")]
    DuplicateKey { column: String, key: String },

    /// The precomputed trajectory feature store does not cover every flight.
    #[error(
        "Trajectory feature store is incomplete: {missing} flight(s) missing (first: {first}); \
         rerun the trajectory batch job"
    )]
    IncompleteFeatureStore { missing: usize, first: String },

    /// A model was used in a state that does not allow the call (predict before train).
    #[error("Invalid model state: {0}")]
    ModelState(String),

    /// A retryable failure in an auxiliary data fetch.
    #[error("Transient error: {0}")]
    Transient(String),

    /// A preprocessing stage failed; `source` is the original error.
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Binary (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether the operation that produced this error may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }

    /// Configuration errors are fatal for the whole run.
    pub fn is_config(&self) -> bool {
        match self {
            PipelineError::Config(_) => true,
            PipelineError::StageFailed { source, .. } => source.is_config(),
            _ => false,
        }
    }

    /// Strips `StageFailed` wrappers and returns the error raised by the stage itself.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Shorthand for [`PipelineError::MissingColumn`].
    pub fn missing_column(column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            column: column.into(),
        }
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = PipelineError::Config("airports.csv not found".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_display_missing_column() {
        let err = PipelineError::missing_column("adep");
        assert_eq!(err.to_string(), "Missing column: 'adep'");
    }

    #[test]
    fn test_error_display_incomplete_store() {
        let err = PipelineError::IncompleteFeatureStore {
            missing: 3,
            first: "248750012".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 flight(s)"));
        assert!(msg.contains("248750012"));
    }

    #[test]
    fn test_stage_failed_names_stage_and_keeps_root() {
        let err = PipelineError::StageFailed {
            stage: "trajectory".to_string(),
            source: Box::new(PipelineError::Config("store missing".to_string())),
        };
        assert!(err.to_string().contains("Stage 'trajectory' failed"));
        assert!(matches!(err.root_cause(), PipelineError::Config(_)));
        assert!(err.is_config());
    }

    #[test]
    fn test_transient_classification() {
        assert!(PipelineError::Transient("timeout".to_string()).is_transient());
        assert!(!PipelineError::Config("x".to_string()).is_transient());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_error_from_bincode_error() {
        let bad_bytes: &[u8] = &[0xff, 0xff, 0xff, 0xff];
        let bincode_result: std::result::Result<String, bincode::Error> =
            bincode::deserialize(bad_bytes);
        if let Err(e) = bincode_result {
            let err: PipelineError = e.into();
            assert!(matches!(err, PipelineError::Serialization(_)));
        }
    }

    #[test]
    fn test_error_is_std_error() {
        let err = PipelineError::InvalidArgument("test".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
