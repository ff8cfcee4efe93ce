//! Error types for the CLI

use lua_bridge::ValidationError;
use std::io;
use thiserror::Error;
use udf_module::UdfError;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O error
    #[error("File error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON in a config file or argument
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed input of the wrong shape
    #[error("Invalid input: {0}")]
    Input(String),

    /// Module rejected the operation
    #[error("{0}")]
    Udf(#[from] UdfError),

    /// Script did not pass validation
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// Script function raised
    #[error("Script error: {0}")]
    Script(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
