//! Error types for the Lua boundary

use host_types::HostError;
use instance_pool::CreateError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for operations on a Lua instance
pub type BridgeResult<T> = Result<T, BridgeError>;

/// A value could not cross the host/interpreter boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// A host-owned value was released by the host while the script still held it
    #[error("{0} is no longer available: released by the host")]
    Released(&'static str),
    /// The value kind has no generic conversion
    #[error("{0} values cannot cross the script boundary")]
    Unsupported(&'static str),
    /// A map key of an unsupported kind
    #[error("{0} cannot be used as a map key")]
    InvalidMapKey(&'static str),
    /// List or byte index outside the valid range
    #[error("index {index} out of range for {kind} of length {len}")]
    IndexOutOfRange {
        /// Container kind
        kind: &'static str,
        /// 1-based index requested
        index: i64,
        /// Current length
        len: usize,
    },
    /// Byte values must fit in 0..=255
    #[error("byte value {0} out of range")]
    ByteRange(i64),
    /// Storing the value would make a list, map or record contain itself
    #[error("{0} cannot be stored inside itself")]
    Cycle(&'static str),
    /// Nested tables deeper than the conversion limit (likely a cycle)
    #[error("table nesting exceeds {0} levels")]
    TooDeep(usize),
    /// A host collaborator rejected the operation
    #[error(transparent)]
    Host(#[from] HostError),
}

impl From<BoundaryError> for mlua::Error {
    fn from(err: BoundaryError) -> Self {
        mlua::Error::external(err)
    }
}

/// Failure while driving a Lua instance
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// Raised by the interpreter or by a script
    #[error("{}", describe_lua_error(.0))]
    Lua(#[from] mlua::Error),
    /// A value could not cross the boundary
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    /// Instance fabrication failed
    #[error(transparent)]
    Create(#[from] CreateError),
}

/// A configured script search path cannot be used
#[derive(Debug, Error)]
pub enum PathError {
    /// Path left empty
    #[error("{role} script path is not set")]
    Unset {
        /// `system` or `user`
        role: &'static str,
    },
    /// Directory cannot be opened
    #[error("cannot open {role} script path {}: {source}", path.display())]
    Unopenable {
        /// `system` or `user`
        role: &'static str,
        /// Configured path
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },
}

/// Render an interpreter error as a single diagnostic message.
///
/// Callback errors are unwrapped to their cause and stack tracebacks are
/// dropped.
pub fn describe_lua_error(err: &mlua::Error) -> String {
    let message = match err {
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::MemoryError(message) => message.clone(),
        mlua::Error::CallbackError { cause, .. } => return describe_lua_error(cause),
        mlua::Error::ExternalError(inner) => inner.to_string(),
        other => other.to_string(),
    };
    match message.split_once("\nstack traceback:") {
        Some((head, _)) => head.to_string(),
        None => message,
    }
}
