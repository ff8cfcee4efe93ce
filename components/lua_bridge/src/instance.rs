//! A ready-to-call Lua state bound to one script

use crate::catalog::{ScriptEntry, ScriptKind};
use crate::convert::{from_lua, to_lua};
use crate::error::BridgeResult;
use crate::prelude;
use crate::userdata::{HostBox, RecordBox, StreamBox};
use host_types::{HostContext, Record, Stream, Value};
use instance_pool::{Generation, PooledInstance, ScriptKey};
use mlua::{Function, Lua, Table, Variadic};
use mlua::Value as LuaValue;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Global name of the per-call host handle
pub const HOST_GLOBAL: &str = "host";

/// Which half of a stream pipeline an invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamScope {
    /// On the node holding the data, up to the first reduce
    Server,
    /// On the node merging partial results
    Client,
}

impl StreamScope {
    /// Scope for a module running in server mode or not
    pub fn for_server_mode(server_mode: bool) -> Self {
        if server_mode {
            StreamScope::Server
        } else {
            StreamScope::Client
        }
    }

    /// Name the pipeline driver understands
    pub fn as_str(self) -> &'static str {
        match self {
            StreamScope::Server => "server",
            StreamScope::Client => "client",
        }
    }
}

/// Function and converted arguments, ready to run
pub struct PreparedCall {
    function: Function,
    args: Vec<LuaValue>,
}

impl PreparedCall {
    /// Number of arguments pushed
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

/// Interpreter instance for one script key.
///
/// Built by [`LuaFactory`](crate::LuaFactory); reused across calls through
/// the instance pool.
pub struct LuaInstance {
    lua: Lua,
    key: ScriptKey,
    kind: ScriptKind,
    generation: Generation,
    calls: u64,
}

impl LuaInstance {
    pub(crate) fn new(lua: Lua, entry: &ScriptEntry) -> Self {
        Self {
            lua,
            key: entry.key.clone(),
            kind: entry.kind,
            generation: entry.generation.clone(),
            calls: 0,
        }
    }

    /// Script key this instance was built for
    pub fn key(&self) -> &ScriptKey {
        &self.key
    }

    /// How the script was loaded
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    /// Invocations run on this instance
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Underlying interpreter
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Expose `host` to the script for the current call
    pub fn bind_host(&self, host: &Arc<dyn HostContext>) -> BridgeResult<()> {
        self.lua.globals().set(HOST_GLOBAL, HostBox::host(host))?;
        Ok(())
    }

    /// Clear the host handle
    pub fn unbind_host(&self) -> BridgeResult<()> {
        self.lua.globals().set(HOST_GLOBAL, LuaValue::Nil)?;
        Ok(())
    }

    /// Whether a host handle is currently bound
    pub fn is_host_bound(&self) -> bool {
        matches!(
            self.lua.globals().get::<LuaValue>(HOST_GLOBAL),
            Ok(LuaValue::UserData(_))
        )
    }

    /// Locate `name` among the script's functions.
    ///
    /// Lua scripts define globals; native modules are reached through
    /// `require`.
    pub fn function(&self, name: &str) -> BridgeResult<Function> {
        let found = match self.kind {
            ScriptKind::Lua => self.lua.globals().get::<LuaValue>(name)?,
            ScriptKind::Native => {
                let require: Function = self.lua.globals().get("require")?;
                let module: Table = require.call(self.key.as_str())?;
                module.get::<LuaValue>(name)?
            }
        };
        match found {
            LuaValue::Function(function) => Ok(function),
            _ => Err(mlua::Error::RuntimeError(format!(
                "function '{}' not found in '{}'",
                name, self.key
            ))
            .into()),
        }
    }

    /// Look up `function` and push the record and arguments.
    ///
    /// The record is host-owned; compound arguments get their own
    /// reservation.
    pub fn prepare_record_call(
        &self,
        function: &str,
        record: &Arc<dyn Record>,
        args: &[Value],
    ) -> BridgeResult<PreparedCall> {
        let function = self.function(function)?;
        let mut pushed = Vec::with_capacity(args.len() + 1);
        pushed.push(LuaValue::UserData(self.lua.create_userdata(RecordBox::host(record))?));
        for arg in args {
            pushed.push(to_lua(&self.lua, arg)?);
        }
        Ok(PreparedCall {
            function,
            args: pushed,
        })
    }

    /// Look up `function` and wrap it in the stream pipeline driver
    pub fn prepare_stream_call(
        &self,
        function: &str,
        scope: StreamScope,
        input: &Arc<dyn Stream>,
        output: &Arc<dyn Stream>,
        args: &[Value],
    ) -> BridgeResult<PreparedCall> {
        let target = self.function(function)?;
        let driver = prelude::apply_stream(&self.lua)?;
        let mut pushed = Vec::with_capacity(args.len() + 4);
        pushed.push(LuaValue::Function(target));
        pushed.push(LuaValue::String(self.lua.create_string(scope.as_str())?));
        pushed.push(LuaValue::UserData(self.lua.create_userdata(StreamBox::host(input))?));
        pushed.push(LuaValue::UserData(self.lua.create_userdata(StreamBox::host(output))?));
        for arg in args {
            pushed.push(to_lua(&self.lua, arg)?);
        }
        Ok(PreparedCall {
            function: driver,
            args: pushed,
        })
    }

    /// Run a prepared call and return its first result
    pub fn invoke(&mut self, call: PreparedCall) -> BridgeResult<LuaValue> {
        self.calls += 1;
        let args: Variadic<LuaValue> = call.args.into_iter().collect();
        let result: LuaValue = call.function.call(args)?;
        Ok(result)
    }

    /// Copy a call result out to the host
    pub fn convert_result(&self, result: &LuaValue) -> BridgeResult<Value> {
        Ok(from_lua(result)?)
    }
}

impl fmt::Debug for LuaInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaInstance")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .field("calls", &self.calls)
            .finish()
    }
}

impl PooledInstance for LuaInstance {
    fn generation(&self) -> &Generation {
        &self.generation
    }

    fn recycle(&mut self) {
        if let Err(err) = self.unbind_host() {
            debug!(key = %self.key, error = %err, "failed to unbind host handle");
        }
        if let Err(err) = self.lua.gc_step() {
            debug!(key = %self.key, error = %err, "incremental collection step failed");
        }
    }
}
