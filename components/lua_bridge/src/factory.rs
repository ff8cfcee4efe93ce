//! Instance fabrication
//!
//! Every instance gets the same bindings in the same order: native modules,
//! the prelude, then the search paths. Only the script body differs.

use crate::catalog::{ScriptCatalog, ScriptEntry, ScriptKind, SearchPaths};
use crate::error::describe_lua_error;
use crate::instance::LuaInstance;
use crate::{modules, prelude};
use instance_pool::{CreateError, InstanceFactory, PoolResult, ScriptKey};
use mlua::{Lua, LuaOptions, StdLib, Table};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Fresh interpreter for a script of `kind`
pub(crate) fn new_state(kind: ScriptKind) -> mlua::Result<Lua> {
    match kind {
        ScriptKind::Lua => Lua::new_with(StdLib::ALL_SAFE, LuaOptions::new()),
        // SAFETY: native modules need the C module searcher, which mlua only
        // leaves enabled in an unrestricted state. The module is host-installed
        // code from a configured search root.
        ScriptKind::Native => Ok(unsafe { Lua::unsafe_new_with(StdLib::ALL_SAFE, LuaOptions::new()) }),
    }
}

/// Install the shared bindings into `lua`
pub(crate) fn install_bindings(lua: &Lua, paths: &SearchPaths) -> mlua::Result<()> {
    modules::install(lua)?;
    prelude::install(lua)?;
    let package: Table = lua.globals().get("package")?;
    package.set("path", paths.package_path())?;
    package.set("cpath", paths.package_cpath())?;
    Ok(())
}

fn load_error(key: &ScriptKey, err: mlua::Error) -> CreateError {
    let key = key.clone();
    match err {
        mlua::Error::SyntaxError { message, .. } => CreateError::Load { key, message },
        mlua::Error::MemoryError(_) => CreateError::OutOfMemory(key),
        other => CreateError::Execute {
            key,
            message: describe_lua_error(&other),
        },
    }
}

/// Builds [`LuaInstance`]s from catalog entries.
pub struct LuaFactory {
    catalog: Arc<ScriptCatalog>,
}

impl LuaFactory {
    /// Factory reading scripts from `catalog`
    pub fn new(catalog: Arc<ScriptCatalog>) -> Self {
        Self { catalog }
    }

    /// Catalog the factory reads from
    pub fn catalog(&self) -> &Arc<ScriptCatalog> {
        &self.catalog
    }

    /// Build an instance for `entry`.
    ///
    /// Lua scripts are executed once so their functions exist; native
    /// modules are loaded lazily on first lookup.
    pub fn build(&self, entry: &ScriptEntry) -> PoolResult<LuaInstance> {
        let started = Instant::now();
        let key = &entry.key;

        let lua = new_state(entry.kind).map_err(|err| CreateError::Bindings {
            key: key.clone(),
            message: describe_lua_error(&err),
        })?;
        install_bindings(&lua, &self.catalog.paths()).map_err(|err| CreateError::Bindings {
            key: key.clone(),
            message: describe_lua_error(&err),
        })?;

        if entry.kind == ScriptKind::Lua {
            lua.load(&entry.content[..])
                .set_name(format!("@{}.lua", key))
                .exec()
                .map_err(|err| load_error(key, err))?;
        }

        debug!(
            %key,
            generation = %entry.generation,
            elapsed_us = started.elapsed().as_micros() as u64,
            "interpreter instance created"
        );
        Ok(LuaInstance::new(lua, entry))
    }
}

impl InstanceFactory for LuaFactory {
    type Instance = LuaInstance;

    fn create(&self, key: &ScriptKey) -> PoolResult<LuaInstance> {
        let entry = self
            .catalog
            .resolve(key)
            .map_err(|err| CreateError::Load {
                key: key.clone(),
                message: err.to_string(),
            })?
            .ok_or_else(|| CreateError::NotFound(key.clone()))?;
        self.build(&entry)
    }
}
