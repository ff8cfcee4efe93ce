//! Error types for the UDF module

use instance_pool::{CreateError, KeyError, PoolConfigError, ScriptKey};
use lua_bridge::{BridgeError, PathError};
use std::io;
use thiserror::Error;

/// Result type for module operations
pub type UdfResult<T> = Result<T, UdfError>;

/// Host-level failure of a module operation.
///
/// Script errors raised while a function runs are not reported here; they
/// come back as [`CallResult::Failure`](crate::CallResult::Failure).
#[derive(Debug, Error)]
pub enum UdfError {
    /// Rejected configuration
    #[error("invalid configuration: {0}")]
    Configuration(#[from] PoolConfigError),
    /// An interpreter instance could not be built
    #[error("cannot create interpreter: {0}")]
    Creation(#[from] CreateError),
    /// Script search paths unusable at call time
    #[error("script environment unavailable: {0}")]
    Environment(#[from] PathError),
    /// Malformed script name
    #[error("invalid script name: {0}")]
    Key(#[from] KeyError),
    /// No script file for the name under either root
    #[error("script not found: {0}")]
    NotFound(ScriptKey),
    /// The host handle could not be bound into the instance
    #[error("cannot bind invocation context: {0}")]
    Bridge(#[from] BridgeError),
    /// Reading script files failed
    #[error(transparent)]
    Io(#[from] io::Error),
}
