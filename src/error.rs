//! Error types for the RRSM engine

use thiserror::Error;

/// Errors that can occur during computation
///
/// Sparse input is never an error: too few nights yields a low-confidence
/// insight and missing metrics yield absent score fields.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse night rows: {0}")]
    ParseError(String),

    #[error("Invalid UTC offset: {0}")]
    InvalidOffset(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
