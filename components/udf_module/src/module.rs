//! Host-facing module operations

use crate::config::ModuleConfig;
use crate::engine::{CallResult, EngineStats, InvocationEngine};
use crate::error::{UdfError, UdfResult};
use host_types::{HostContext, Record, Stream, Value};
use instance_pool::{PoolStats, ScriptKey};
use lua_bridge::{ScanReport, ScriptCatalog, StreamScope, ValidationResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// The UDF module as the storage server sees it.
///
/// All operations take `&self` and may be called from any number of worker
/// threads at once.
pub struct UdfModule {
    config: RwLock<ModuleConfig>,
    catalog: Arc<ScriptCatalog>,
    engine: InvocationEngine,
}

impl Default for UdfModule {
    fn default() -> Self {
        let catalog = Arc::new(ScriptCatalog::new(Default::default()));
        Self {
            config: RwLock::new(ModuleConfig::default().with_cache(false)),
            engine: InvocationEngine::new(Arc::clone(&catalog)),
            catalog,
        }
    }
}

impl UdfModule {
    /// Module configured with `config`
    pub fn new(config: ModuleConfig) -> UdfResult<Self> {
        let module = Self::default();
        module.configure(config)?;
        Ok(module)
    }

    /// Apply `config`.
    ///
    /// Enabling the cache creates the pool registry; disabling it closes
    /// every pooled instance. Changing either search root forgets all
    /// registered scripts and rescans. An unopenable root is logged and
    /// reported by later invocations rather than here.
    pub fn configure(&self, config: ModuleConfig) -> UdfResult<()> {
        config.validate()?;

        let paths = config.search_paths();
        let paths_changed = {
            let mut current = self.config.write();
            let changed = current.search_paths() != paths || self.catalog.paths() != paths;
            *current = config.clone();
            changed
        };

        if config.cache_enabled {
            self.engine.enable_cache(config.pool);
        } else {
            self.engine.disable_cache();
        }

        if paths_changed {
            self.engine.clear();
            self.catalog.set_paths(paths.clone());
            match paths.verify() {
                Ok(()) => {
                    self.rescan_script_directories()?;
                }
                Err(err) => warn!(error = %err, "script path unavailable"),
            }
        }

        info!(
            server_mode = config.server_mode,
            cache_enabled = config.cache_enabled,
            system_path = %config.system_path.display(),
            user_path = %config.user_path.display(),
            "udf module configured"
        );
        Ok(())
    }

    /// Current configuration
    pub fn config(&self) -> ModuleConfig {
        self.config.read().clone()
    }

    /// Script catalog
    pub fn catalog(&self) -> &Arc<ScriptCatalog> {
        &self.catalog
    }

    /// Register `content` as Lua script `name`, replacing any previous
    /// content and draining its pool
    pub fn add_script(&self, name: &str, content: &[u8]) -> UdfResult<()> {
        let key = ScriptKey::new(name)?;
        let entry = self.catalog.insert_inline(key, content.to_vec());
        self.engine.reset(&entry);
        Ok(())
    }

    /// Forget script `name` and destroy its pool; absent names are ignored
    pub fn remove_script(&self, name: &str) -> UdfResult<()> {
        let key = ScriptKey::new(name)?;
        self.forget(&key);
        Ok(())
    }

    /// A script file named `file_name` appeared or changed on disk
    pub fn on_script_added(&self, file_name: &str) -> UdfResult<()> {
        let key = ScriptKey::from_file_name(file_name)?;
        let entry = self
            .catalog
            .load_file(&key)?
            .ok_or_else(|| UdfError::NotFound(key.clone()))?;
        self.engine.reset(&entry);
        Ok(())
    }

    /// A script file named `file_name` was deleted
    pub fn on_script_removed(&self, file_name: &str) -> UdfResult<()> {
        let key = ScriptKey::from_file_name(file_name)?;
        self.forget(&key);
        Ok(())
    }

    fn forget(&self, key: &ScriptKey) {
        self.catalog.remove(key);
        self.engine.remove(key);
    }

    /// Re-read both script roots and reset every changed pool
    pub fn rescan_script_directories(&self) -> UdfResult<ScanReport> {
        self.catalog.paths().verify()?;
        let report = self.catalog.scan()?;
        for entry in &report.changed {
            self.engine.reset(entry);
        }
        for key in &report.removed {
            self.engine.remove(key);
        }
        Ok(report)
    }

    /// Dry-run `content` without registering it or touching any pool
    pub fn validate(&self, name: &str, content: &[u8]) -> ValidationResult {
        lua_bridge::validate(&self.catalog.paths(), name, content)
    }

    /// Call `function` in `script` with `record` and `args`
    pub fn apply_to_record(
        &self,
        host: &Arc<dyn HostContext>,
        script: &str,
        function: &str,
        record: &Arc<dyn Record>,
        args: &[Value],
    ) -> UdfResult<CallResult> {
        let key = ScriptKey::new(script)?;
        self.engine.apply_to_record(host, &key, function, record, args)
    }

    /// Run the stream function `function` in `script` from `input` to `output`
    pub fn apply_to_stream(
        &self,
        host: &Arc<dyn HostContext>,
        script: &str,
        function: &str,
        input: &Arc<dyn Stream>,
        output: &Arc<dyn Stream>,
        args: &[Value],
    ) -> UdfResult<CallResult> {
        let key = ScriptKey::new(script)?;
        let scope = StreamScope::for_server_mode(self.config.read().server_mode);
        self.engine
            .apply_to_stream(host, &key, function, scope, input, output, args)
    }

    /// Engine counters
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Pool counters for `script`, when it has a pool
    pub fn pool_stats(&self, script: &str) -> Option<PoolStats> {
        let key = ScriptKey::new(script).ok()?;
        self.engine.pool_stats(&key)
    }
}
