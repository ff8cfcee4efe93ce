//! Lua-side globals: module constructors, log helpers and the stream pipeline

use mlua::{Function, Lua, Table};

/// Registry slot holding the stream pipeline driver
pub const APPLY_STREAM: &str = "udf.apply_stream";

const SOURCE: &str = include_str!("prelude.lua");

/// Run the prelude in `lua`.
///
/// The `list`, `map` and `bytes` modules must already be installed.
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let exports: Table = lua.load(SOURCE).set_name("=prelude").eval()?;
    let apply: Function = exports.get("apply_stream")?;
    lua.set_named_registry_value(APPLY_STREAM, apply)
}

/// The stream pipeline driver installed by [`install`]
pub fn apply_stream(lua: &Lua) -> mlua::Result<Function> {
    lua.named_registry_value(APPLY_STREAM)
}
