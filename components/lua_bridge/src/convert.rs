//! Value conversion across the boundary
//!
//! Scalars are copied. Host compounds enter Lua as interpreter-owned
//! userdata; Lua tables leave as fresh host lists or maps.

use crate::error::BoundaryError;
use crate::userdata::{BytesBox, HostBox, ListBox, MapBox, RecordBox, StreamBox, ValueIterator};
use host_types::{List, Map, MapKey, Value};
use mlua::{AnyUserData, Lua, Table};
use mlua::Value as LuaValue;
use std::collections::BTreeMap;

/// Deepest table nesting copied out of the interpreter
pub const MAX_DEPTH: usize = host_types::MAX_DEPTH;

/// Push a host value into `lua`.
///
/// Compound values are boxed with a fresh reservation of their own.
pub fn to_lua(lua: &Lua, value: &Value) -> mlua::Result<LuaValue> {
    let converted = match value {
        Value::Nil => LuaValue::Nil,
        Value::Boolean(b) => LuaValue::Boolean(*b),
        Value::Integer(n) => LuaValue::Integer(*n),
        Value::Double(n) => LuaValue::Number(*n),
        Value::Text(s) => LuaValue::String(lua.create_string(s)?),
        Value::Bytes(bytes) => LuaValue::UserData(lua.create_userdata(BytesBox::owned(bytes.clone()))?),
        Value::List(list) => LuaValue::UserData(lua.create_userdata(ListBox::owned(list.clone()))?),
        Value::Map(map) => LuaValue::UserData(lua.create_userdata(MapBox::owned(map.clone()))?),
        Value::Record(record) => {
            LuaValue::UserData(lua.create_userdata(RecordBox::owned(record.clone()))?)
        }
        Value::Pair(first, second) => {
            let pair = List::from_vec(vec![(**first).clone(), (**second).clone()]);
            LuaValue::UserData(lua.create_userdata(ListBox::owned(pair))?)
        }
    };
    Ok(converted)
}

/// Copy a Lua value out to the host
pub fn from_lua(value: &LuaValue) -> mlua::Result<Value> {
    from_lua_at(value, 0)
}

/// Convert a Lua value used as a map key
pub fn map_key(value: &LuaValue) -> mlua::Result<MapKey> {
    key_at(value, 0)
}

/// Reject storing `value` inside `container` when that would form a cycle
pub fn ensure_acyclic(container: &Value, value: &Value) -> Result<(), BoundaryError> {
    if value.reaches(container) {
        return Err(BoundaryError::Cycle(container.type_name()));
    }
    Ok(())
}

/// Integral float keys address the same slot as the equal integer.
fn integral(n: f64) -> Option<i64> {
    // 2^63 itself is out of range.
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

fn key_at(value: &LuaValue, depth: usize) -> mlua::Result<MapKey> {
    if let LuaValue::Number(n) = value {
        if let Some(n) = integral(*n) {
            return Ok(MapKey::Integer(n));
        }
    }
    let value = from_lua_at(value, depth)?;
    MapKey::try_from(&value).map_err(|kind| BoundaryError::InvalidMapKey(kind).into())
}

fn from_lua_at(value: &LuaValue, depth: usize) -> mlua::Result<Value> {
    let converted = match value {
        LuaValue::Nil => Value::Nil,
        LuaValue::Boolean(b) => Value::Boolean(*b),
        LuaValue::Integer(n) => Value::Integer(*n),
        LuaValue::Number(n) => Value::Double(*n),
        LuaValue::String(s) => match s.to_str() {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => Value::from(s.as_bytes().to_vec()),
        },
        LuaValue::Table(table) => table_to_host(table, depth)?,
        LuaValue::UserData(ud) => userdata_to_host(ud)?,
        _ => Value::Nil,
    };
    Ok(converted)
}

fn userdata_to_host(ud: &AnyUserData) -> mlua::Result<Value> {
    if let Ok(list) = ud.borrow::<ListBox>() {
        return Ok(Value::List(list.list()?));
    }
    if let Ok(map) = ud.borrow::<MapBox>() {
        return Ok(Value::Map(map.map()?));
    }
    if let Ok(bytes) = ud.borrow::<BytesBox>() {
        return Ok(Value::Bytes(bytes.bytes()?));
    }
    if let Ok(record) = ud.borrow::<RecordBox>() {
        return Ok(Value::Record(record.record()?));
    }

    // A failed borrow of a container type means the same userdata is
    // already borrowed by the running operation.
    let held = if ud.is::<ListBox>() {
        Some("list")
    } else if ud.is::<MapBox>() {
        Some("map")
    } else if ud.is::<RecordBox>() {
        Some("record")
    } else {
        None
    };
    if let Some(kind) = held {
        return Err(BoundaryError::Cycle(kind).into());
    }

    let kind = if ud.is::<ValueIterator>() {
        "iterator"
    } else if ud.is::<StreamBox>() {
        "stream"
    } else if ud.is::<HostBox>() {
        "host"
    } else {
        "userdata"
    };
    Err(BoundaryError::Unsupported(kind).into())
}

/// Pure sequences become lists; any other table becomes a map.
fn table_to_host(table: &Table, depth: usize) -> mlua::Result<Value> {
    if depth >= MAX_DEPTH {
        return Err(BoundaryError::TooDeep(MAX_DEPTH).into());
    }

    let mut pairs = Vec::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        pairs.push(pair?);
    }

    let len = table.raw_len();
    if len > 0 && pairs.len() == len {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            let item: LuaValue = table.raw_get(i)?;
            items.push(from_lua_at(&item, depth + 1)?);
        }
        return Ok(Value::List(List::from_vec(items)));
    }

    let mut entries = BTreeMap::new();
    for (key, value) in pairs {
        entries.insert(key_at(&key, depth + 1)?, from_lua_at(&value, depth + 1)?);
    }
    Ok(Value::Map(Map::new(entries)))
}
