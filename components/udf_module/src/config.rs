//! Module configuration

use instance_pool::{PoolConfig, PoolConfigError};
use lua_bridge::SearchPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options applied by [`UdfModule::configure`](crate::UdfModule::configure).
///
/// Every field has a default, so partial JSON documents deserialize.
///
/// # Example
///
/// ```
/// use udf_module::ModuleConfig;
///
/// let config: ModuleConfig = serde_json::from_str(r#"{"cache_enabled": false}"#).unwrap();
/// assert!(!config.cache_enabled);
/// assert!(config.server_mode);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Run stream pipelines in server scope
    pub server_mode: bool,
    /// Pool interpreter instances between calls
    pub cache_enabled: bool,
    /// Root for scripts shipped with the server
    pub system_path: PathBuf,
    /// Root for user-registered scripts
    pub user_path: PathBuf,
    /// Pool sizing policy
    pub pool: PoolConfig,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            server_mode: true,
            cache_enabled: true,
            system_path: PathBuf::new(),
            user_path: PathBuf::new(),
            pool: PoolConfig::default(),
        }
    }
}

impl ModuleConfig {
    /// Set server or client scope for stream calls
    pub fn with_server_mode(mut self, server_mode: bool) -> Self {
        self.server_mode = server_mode;
        self
    }

    /// Enable or disable instance pooling
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set both script roots
    pub fn with_paths(mut self, system: impl Into<PathBuf>, user: impl Into<PathBuf>) -> Self {
        self.system_path = system.into();
        self.user_path = user.into();
        self
    }

    /// Set the pool sizing policy
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Script roots as search paths
    pub fn search_paths(&self) -> SearchPaths {
        SearchPaths::new(self.system_path.clone(), self.user_path.clone())
    }

    /// Check the pool policy
    pub fn validate(&self) -> Result<(), PoolConfigError> {
        self.pool.validate()
    }
}
