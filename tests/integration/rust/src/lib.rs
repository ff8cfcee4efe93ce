//! Integration test suite for the UDF subsystem
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Re-export components for test convenience
pub mod components {
    pub use host_types;
    pub use instance_pool;
    pub use lua_bridge;
    pub use udf_cli;
    pub use udf_module;
}

/// A pair of empty script roots that live as long as the value
pub struct ScriptRoots {
    /// System root
    pub system: TempDir,
    /// User root
    pub user: TempDir,
}

impl ScriptRoots {
    /// Create both roots
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            system: TempDir::new()?,
            user: TempDir::new()?,
        })
    }

    /// Module config pointing at both roots
    pub fn config(&self) -> udf_module::ModuleConfig {
        udf_module::ModuleConfig::default().with_paths(self.system.path(), self.user.path())
    }

    /// Write `source` as `<root>/<file>` and return its path
    pub fn write(&self, root: &Path, file: &str, source: &str) -> std::io::Result<PathBuf> {
        let path = root.join(file);
        fs::write(&path, source)?;
        Ok(path)
    }
}
