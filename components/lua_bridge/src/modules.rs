//! Script-visible `list`, `map`, `bytes` and `record` modules

use crate::convert::{ensure_acyclic, from_lua, map_key, to_lua};
use crate::userdata::{BytesBox, ListBox, MapBox, RecordBox, ValueIterator};
use host_types::{Bytes, List, Map, Value};
use mlua::{Lua, Table, UserDataRef};
use mlua::Value as LuaValue;
use std::collections::BTreeMap;

/// Install every module as a global of `lua`
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    globals.set("list", list_module(lua)?)?;
    globals.set("map", map_module(lua)?)?;
    globals.set("bytes", bytes_module(lua)?)?;
    globals.set("record", record_module(lua)?)?;
    Ok(())
}

fn list_from_table(init: Option<Table>) -> mlua::Result<List> {
    let mut items = Vec::new();
    if let Some(table) = init {
        for i in 1..=table.raw_len() {
            let item: LuaValue = table.raw_get(i)?;
            items.push(from_lua(&item)?);
        }
    }
    Ok(List::from_vec(items))
}

fn list_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "create",
        lua.create_function(|_, init: Option<Table>| Ok(ListBox::owned(list_from_table(init)?)))?,
    )?;

    module.set(
        "size",
        lua.create_function(|_, l: UserDataRef<ListBox>| Ok(l.list()?.read().len()))?,
    )?;

    module.set(
        "append",
        lua.create_function(|_, (l, value): (UserDataRef<ListBox>, LuaValue)| {
            let list = l.list()?;
            let value = from_lua(&value)?;
            ensure_acyclic(&Value::List(list.clone()), &value)?;
            list.write().push(value);
            Ok(())
        })?,
    )?;

    module.set(
        "prepend",
        lua.create_function(|_, (l, value): (UserDataRef<ListBox>, LuaValue)| {
            let list = l.list()?;
            let value = from_lua(&value)?;
            ensure_acyclic(&Value::List(list.clone()), &value)?;
            list.write().insert(0, value);
            Ok(())
        })?,
    )?;

    module.set(
        "remove",
        lua.create_function(|lua, (l, index): (UserDataRef<ListBox>, i64)| {
            let list = l.list()?;
            let removed = {
                let mut items = list.write();
                match index.checked_sub(1).and_then(|i| usize::try_from(i).ok()) {
                    Some(i) if i < items.len() => Some(items.remove(i)),
                    _ => None,
                }
            };
            match removed {
                Some(value) => to_lua(lua, &value),
                None => Ok(LuaValue::Nil),
            }
        })?,
    )?;

    module.set(
        "take",
        lua.create_function(|_, (l, n): (UserDataRef<ListBox>, usize)| {
            let head: Vec<Value> = l.list()?.read().iter().take(n).cloned().collect();
            Ok(ListBox::owned(List::from_vec(head)))
        })?,
    )?;

    module.set(
        "drop",
        lua.create_function(|_, (l, n): (UserDataRef<ListBox>, usize)| {
            let tail: Vec<Value> = l.list()?.read().iter().skip(n).cloned().collect();
            Ok(ListBox::owned(List::from_vec(tail)))
        })?,
    )?;

    module.set(
        "clone",
        lua.create_function(|_, l: UserDataRef<ListBox>| Ok(ListBox::owned(l.list()?.deep_clone())))?,
    )?;

    module.set(
        "iterator",
        lua.create_function(|_, l: UserDataRef<ListBox>| Ok(ValueIterator::values(&l.list()?)))?,
    )?;

    Ok(module)
}

fn map_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "create",
        lua.create_function(|_, init: Option<Table>| {
            let mut entries = BTreeMap::new();
            if let Some(table) = init {
                for pair in table.pairs::<LuaValue, LuaValue>() {
                    let (key, value) = pair?;
                    entries.insert(map_key(&key)?, from_lua(&value)?);
                }
            }
            Ok(MapBox::owned(Map::new(entries)))
        })?,
    )?;

    module.set(
        "size",
        lua.create_function(|_, m: UserDataRef<MapBox>| Ok(m.map()?.read().len()))?,
    )?;

    module.set(
        "remove",
        lua.create_function(|_, (m, key): (UserDataRef<MapBox>, LuaValue)| {
            let key = map_key(&key)?;
            m.map()?.write().remove(&key);
            Ok(())
        })?,
    )?;

    module.set(
        "clone",
        lua.create_function(|_, m: UserDataRef<MapBox>| Ok(MapBox::owned(m.map()?.deep_clone())))?,
    )?;

    module.set(
        "iterator",
        lua.create_function(|_, m: UserDataRef<MapBox>| Ok(ValueIterator::entries(&m.map()?)))?,
    )?;

    module.set(
        "keys",
        lua.create_function(|_, m: UserDataRef<MapBox>| Ok(ValueIterator::keys(&m.map()?)))?,
    )?;

    module.set(
        "values",
        lua.create_function(|_, m: UserDataRef<MapBox>| Ok(ValueIterator::map_values(&m.map()?)))?,
    )?;

    Ok(module)
}

fn bytes_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "create",
        lua.create_function(|_, size: Option<usize>| {
            Ok(BytesBox::owned(Bytes::new(vec![0; size.unwrap_or(0)])))
        })?,
    )?;

    module.set(
        "size",
        lua.create_function(|_, b: UserDataRef<BytesBox>| Ok(b.bytes()?.read().len()))?,
    )?;

    module.set(
        "get_byte",
        lua.create_function(|_, (b, index): (UserDataRef<BytesBox>, i64)| Ok(b.get(index)?))?,
    )?;

    module.set(
        "set_byte",
        lua.create_function(|_, (b, index, value): (UserDataRef<BytesBox>, i64, i64)| {
            Ok(b.set(index, value)?)
        })?,
    )?;

    module.set(
        "append_string",
        lua.create_function(|_, (b, s): (UserDataRef<BytesBox>, mlua::String)| {
            b.bytes()?.write().extend_from_slice(&s.as_bytes());
            Ok(())
        })?,
    )?;

    module.set(
        "tostring",
        lua.create_function(|lua, b: UserDataRef<BytesBox>| {
            let bytes = b.bytes()?;
            let buf = bytes.read();
            lua.create_string(&*buf)
        })?,
    )?;

    Ok(module)
}

fn record_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "ttl",
        lua.create_function(|_, r: UserDataRef<RecordBox>| Ok(r.record()?.ttl()))?,
    )?;

    module.set(
        "gen",
        lua.create_function(|_, r: UserDataRef<RecordBox>| Ok(r.record()?.generation()))?,
    )?;

    module.set(
        "numbins",
        lua.create_function(|_, r: UserDataRef<RecordBox>| Ok(r.record()?.bin_count()))?,
    )?;

    module.set(
        "digest",
        lua.create_function(|_, r: UserDataRef<RecordBox>| {
            let digest = r.record()?.digest();
            Ok(digest.map(|d| BytesBox::owned(Bytes::new(d.to_vec()))))
        })?,
    )?;

    module.set(
        "bin_names",
        lua.create_function(|_, r: UserDataRef<RecordBox>| {
            let names = r.record()?.bin_names().into_iter().map(Value::Text).collect();
            Ok(ListBox::owned(List::from_vec(names)))
        })?,
    )?;

    Ok(module)
}
