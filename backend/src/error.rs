//! Error types for the housing affordability pipeline.
//!
//! One enum per layer:
//!
//! - [`CsvError`] - Dataset loading and CSV parsing errors
//! - [`TableError`] - Table construction invariants
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//! - [`ConfigError`] - Environment configuration errors
//!
//! Conversions are `From` implementations, so `?` works across layers.
//! Per-cell and per-row problems are never errors: they degrade to missing
//! values, synthetic estimates or the `Unknown` class.

use thiserror::Error;

// =============================================================================
// CSV Loading Errors
// =============================================================================

/// Errors while reading a dataset.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file or directory.
    #[error("Failed to read input: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the byte stream.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Malformed CSV that the reader could not recover from.
    #[error("Invalid CSV format: {0}")]
    ParseError(#[from] csv::Error),

    /// Empty input.
    #[error("CSV input is empty")]
    EmptyFile,

    /// Header row missing or blank.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// No CSV file in the data directory.
    #[error("No CSV found in data directory: {0}")]
    NoDataset(String),

    /// Parsed columns did not form a valid table.
    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Table Errors
// =============================================================================

/// Violations of the [`crate::models::Table`] invariants.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    /// A table needs at least one column.
    #[error("A table must have at least one column")]
    NoColumns,

    /// Every column must hold one cell per row.
    #[error("Column '{column}' has {found} cells, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error returned by [`crate::transform::pipeline::analyze_table`]
/// and the loading entry points built on top of it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Table construction error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// No input rows at all. The only fatal data condition.
    #[error("No data rows found in input")]
    DataUnavailable,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<CsvError> for ServerError {
    fn from(err: CsvError) -> Self {
        ServerError::Pipeline(err.into())
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for table construction.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // TableError -> PipelineError
        let table_err = TableError::NoColumns;
        let pipeline_err: PipelineError = table_err.into();
        assert!(pipeline_err.to_string().contains("at least one column"));

        // CsvError -> ServerError
        let server_err: ServerError = CsvError::NoHeaders.into();
        assert!(server_err.to_string().contains("No headers"));
    }

    #[test]
    fn test_ragged_column_format() {
        let err = TableError::RaggedColumn {
            column: "Rent".into(),
            expected: 3,
            found: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("'Rent'"));
        assert!(msg.contains("expected 3"));
    }

    #[test]
    fn test_data_unavailable_is_user_visible() {
        let err = PipelineError::DataUnavailable;
        assert_eq!(err.to_string(), "No data rows found in input");
    }
}
