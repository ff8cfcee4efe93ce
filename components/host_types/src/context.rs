//! Server operations a script may request during an invocation.

use crate::error::HostResult;
use crate::record::Record;
use std::fmt;
use std::sync::Arc;

/// Severity of a script log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Unrecoverable problem
    Error,
    /// Suspicious condition
    Warn,
    /// Normal operational message
    Info,
    /// Diagnostic detail
    Debug,
    /// Very fine-grained diagnostic detail
    Trace,
}

impl LogLevel {
    /// Map a script-supplied numeric level (0 = error .. 4 = trace)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LogLevel::Error),
            1 => Some(LogLevel::Warn),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Debug),
            4 => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Numeric level as seen by scripts
    pub fn code(self) -> i64 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
            LogLevel::Trace => 4,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Host operations bound to a single invocation.
///
/// The host owns the context; scripts only ever observe it through a
/// non-owning handle for the duration of the call.
pub trait HostContext: Send + Sync {
    /// Create `record` in the backing store
    fn create(&self, record: &Arc<dyn Record>) -> HostResult<()>;

    /// Persist pending changes to `record`
    fn update(&self, record: &Arc<dyn Record>) -> HostResult<()>;

    /// Whether `record` exists in the backing store
    fn exists(&self, record: &Arc<dyn Record>) -> bool;

    /// Delete `record` from the backing store
    fn remove(&self, record: &Arc<dyn Record>) -> HostResult<()>;

    /// Emit a script log message
    fn log(&self, level: LogLevel, message: &str);
}
