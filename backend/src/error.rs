//! Error types for the Catalog Buddy transformation pipeline.
//!
//! - [`CsvError`] - CSV decoding, parsing and encoding errors
//! - [`RegistryError`] - Template registry errors
//! - [`PipelineError`] - Request-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Per-cell anomalies (missing columns, bad image positions, malformed
//! `autoMap` values, blank required fields) are not errors: the engine
//! resolves them to empty values or skipped rows.

use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while decoding, parsing or writing delimited text.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read input.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Neither the primary nor the fallback encoding could decode the input.
    #[error("Failed to decode input: {0}")]
    Encoding(String),

    /// Invalid CSV structure.
    #[error("Line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Failed to serialize output rows.
    #[error("Failed to write CSV: {0}")]
    Write(String),

    /// Empty input.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl CsvError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        CsvError::Parse {
            line,
            message: message.into(),
        }
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the template registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Errors that reject a whole transformation request.
///
/// Every variant is a client input error: nothing is partially processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested template key is not in the store.
    #[error("Unknown templateKey: {0}")]
    UnknownTemplate(String),

    /// The mapping payload is not a JSON object of strings.
    #[error("Invalid mapping JSON: {0}")]
    InvalidMapping(String),

    /// The uploaded table could not be decoded or parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let server_err: ServerError = PipelineError::UnknownTemplate("shopify_x".into()).into();
        assert!(server_err.to_string().contains("shopify_x"));
    }

    #[test]
    fn test_parse_error_format() {
        let err = CsvError::parse(5, "unterminated quote");
        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("unterminated quote"));
    }
}
