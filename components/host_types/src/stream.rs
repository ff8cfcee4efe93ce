//! Stream handle capabilities.

use crate::error::HostResult;
use crate::value::Value;

/// A stream of values flowing into or out of a script.
pub trait Stream: Send + Sync {
    /// Next value, or `None` at the end marker
    fn read(&self) -> Option<Value>;

    /// Append a value
    fn write(&self, value: Value) -> HostResult<()>;

    /// Whether `read` may produce values
    fn is_readable(&self) -> bool;

    /// Whether `write` accepts values
    fn is_writable(&self) -> bool;
}
