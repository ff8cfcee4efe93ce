//! Errors raised by host collaborators.

use thiserror::Error;

/// Failure reported by a record, stream or host context implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The stream does not accept writes in its current state
    #[error("stream is not writable")]
    NotWritable,
    /// The record does not exist in the backing store
    #[error("record not found")]
    RecordNotFound,
    /// The record already exists in the backing store
    #[error("record already exists")]
    RecordExists,
    /// A bin name exceeded the server's limits
    #[error("invalid bin name `{0}`")]
    InvalidBin(String),
    /// Value cannot be stored by the host
    #[error("unsupported value: {0}")]
    Unsupported(String),
    /// Any other server-side failure with its result code
    #[error("host operation failed with code {code}: {message}")]
    Failed {
        /// Server result code
        code: i32,
        /// Human-readable message
        message: String,
    },
}

impl HostError {
    /// Result code handed back to scripts for this failure.
    pub fn code(&self) -> i32 {
        match self {
            HostError::NotWritable => 1,
            HostError::RecordNotFound => 2,
            HostError::RecordExists => 5,
            HostError::InvalidBin(_) => 21,
            HostError::Unsupported(_) => 4,
            HostError::Failed { code, .. } => *code,
        }
    }
}

/// Result type for host collaborator operations
pub type HostResult<T> = Result<T, HostError>;
