//! Error types for pooling and instance fabrication

use crate::key::ScriptKey;
use thiserror::Error;

/// Invalid script key or generation stamp
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Empty name
    #[error("script name is empty")]
    Empty,
    /// Name longer than the key limit
    #[error("script name `{0}` exceeds {max} bytes", max = crate::key::MAX_KEY_LEN)]
    TooLong(String),
    /// Name containing a path separator or NUL
    #[error("script name `{0}` contains an invalid character")]
    InvalidChar(String),
}

/// Invalid pool sizing policy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolConfigError {
    /// Capacity floor of zero
    #[error("initial capacity must be at least 1")]
    ZeroCapacity,
    /// Floor above ceiling
    #[error("initial capacity {initial} exceeds maximum {max}")]
    FloorAboveCeiling {
        /// Configured floor
        initial: usize,
        /// Configured ceiling
        max: usize,
    },
    /// Miss ratio outside (0, 1]
    #[error("miss ratio threshold {0} must be within (0, 1]")]
    MissRatio(f64),
    /// Pre-population larger than the floor
    #[error("prewarm count {prewarm} exceeds initial capacity {initial}")]
    Prewarm {
        /// Requested instances
        prewarm: usize,
        /// Configured floor
        initial: usize,
    },
}

/// Failure to build a ready instance.
///
/// Never retried automatically; the partially-built instance is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// No script with this key is known or resolvable
    #[error("script `{0}` not found")]
    NotFound(ScriptKey),
    /// Host bindings could not be installed
    #[error("failed to install host bindings for `{key}`: {message}")]
    Bindings {
        /// Script being built
        key: ScriptKey,
        /// Interpreter message
        message: String,
    },
    /// Script failed to compile
    #[error("failed to load script `{key}`: {message}")]
    Load {
        /// Script being built
        key: ScriptKey,
        /// Interpreter message
        message: String,
    },
    /// Script body raised while executing
    #[error("script `{key}` failed during initialization: {message}")]
    Execute {
        /// Script being built
        key: ScriptKey,
        /// Interpreter message
        message: String,
    },
    /// Interpreter ran out of memory
    #[error("out of memory while creating interpreter for `{0}`")]
    OutOfMemory(ScriptKey),
}

impl CreateError {
    /// Key of the script whose instance failed
    pub fn key(&self) -> &ScriptKey {
        match self {
            CreateError::NotFound(key) | CreateError::OutOfMemory(key) => key,
            CreateError::Bindings { key, .. }
            | CreateError::Load { key, .. }
            | CreateError::Execute { key, .. } => key,
        }
    }
}

/// Result type for instance fabrication
pub type PoolResult<T> = Result<T, CreateError>;
