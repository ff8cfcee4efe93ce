//! Instance fabrication seam

use crate::error::PoolResult;
use crate::key::ScriptKey;
use crate::pool::PooledInstance;

/// Builds fresh, fully initialized instances for a script.
///
/// Two instances created for the same key and generation must be
/// indistinguishable before their first call.
pub trait InstanceFactory {
    /// Instance type produced
    type Instance: PooledInstance;

    /// Build one instance bound to `key`
    fn create(&self, key: &ScriptKey) -> PoolResult<Self::Instance>;
}
