//! Record handle capabilities.

use crate::error::HostResult;
use crate::value::Value;

/// Length of a record digest in bytes
pub const DIGEST_LEN: usize = 20;

/// A server-resident record as seen by a script.
///
/// Implementations synchronize internally; a record may be read from one
/// thread while the invocation that owns it runs on another.
pub trait Record: Send + Sync {
    /// Value stored in `bin`, if present
    fn get(&self, bin: &str) -> Option<Value>;

    /// Store `value` in `bin`
    fn set(&self, bin: &str, value: Value) -> HostResult<()>;

    /// Remove `bin`
    fn remove(&self, bin: &str) -> HostResult<()>;

    /// Time-to-live in seconds
    fn ttl(&self) -> u32;

    /// Record generation counter
    fn generation(&self) -> u16;

    /// Number of bins
    fn bin_count(&self) -> usize;

    /// Names of all bins
    fn bin_names(&self) -> Vec<String>;

    /// Record digest, when the record has one
    fn digest(&self) -> Option<[u8; DIGEST_LEN]>;
}
