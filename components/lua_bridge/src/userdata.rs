//! Userdata wrappers that expose host values to scripts
//!
//! Each wrapper owns a [`ValueBox`]; Lua's collector finalizes the wrapper,
//! which drops the box and with it any reservation the interpreter held.

use crate::boundary::ValueBox;
use crate::convert::{ensure_acyclic, from_lua, map_key, to_lua};
use crate::error::BoundaryError;
use host_types::{Bytes, HostContext, List, LogLevel, Map, MapKey, Record, Stream, Value};
use mlua::{AnyUserData, Lua, MetaMethod, MultiValue, UserData, UserDataMethods, Variadic};
use mlua::Value as LuaValue;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Index of the element addressed by a 1-based script index
fn slot(index: i64) -> Option<usize> {
    index.checked_sub(1).and_then(|i| usize::try_from(i).ok())
}

/// Script view of a host list
pub struct ListBox(ValueBox<RwLock<Vec<Value>>>);

impl ListBox {
    /// Interpreter-owned view of `list`
    pub fn owned(list: List) -> Self {
        ListBox(ValueBox::owned(list.into_arc()))
    }

    /// Underlying host list
    pub fn list(&self) -> Result<List, BoundaryError> {
        self.0.unbox("list").map(List::from_arc)
    }
}

impl UserData for ListBox {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, index: i64| {
            let list = this.list()?;
            let item = slot(index).and_then(|i| list.read().get(i).cloned());
            match item {
                Some(value) => to_lua(lua, &value),
                None => Ok(LuaValue::Nil),
            }
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (index, value): (i64, LuaValue)| {
                let list = this.list()?;
                let value = from_lua(&value)?;
                ensure_acyclic(&Value::List(list.clone()), &value)?;
                let mut items = list.write();
                let len = items.len();
                match slot(index) {
                    Some(i) if i < len => items[i] = value,
                    Some(i) if i == len => items.push(value),
                    _ => {
                        return Err(BoundaryError::IndexOutOfRange {
                            kind: "list",
                            index,
                            len,
                        }
                        .into())
                    }
                }
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.list()?.read().len()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(Value::List(this.list()?).to_string())
        });
    }
}

/// Script view of a host map
pub struct MapBox(ValueBox<RwLock<BTreeMap<MapKey, Value>>>);

impl MapBox {
    /// Interpreter-owned view of `map`
    pub fn owned(map: Map) -> Self {
        MapBox(ValueBox::owned(map.into_arc()))
    }

    /// Underlying host map
    pub fn map(&self) -> Result<Map, BoundaryError> {
        self.0.unbox("map").map(Map::from_arc)
    }
}

impl UserData for MapBox {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: LuaValue| {
            let key = map_key(&key)?;
            let value = this.map()?.read().get(&key).cloned();
            match value {
                Some(value) => to_lua(lua, &value),
                None => Ok(LuaValue::Nil),
            }
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (key, value): (LuaValue, LuaValue)| {
                let key = map_key(&key)?;
                let map = this.map()?;
                if value.is_nil() {
                    map.write().remove(&key);
                } else {
                    let value = from_lua(&value)?;
                    ensure_acyclic(&Value::Map(map.clone()), &value)?;
                    map.write().insert(key, value);
                }
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.map()?.read().len()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(Value::Map(this.map()?).to_string())
        });
    }
}

/// Script view of a host byte buffer
pub struct BytesBox(ValueBox<RwLock<Vec<u8>>>);

impl BytesBox {
    /// Interpreter-owned view of `bytes`
    pub fn owned(bytes: Bytes) -> Self {
        BytesBox(ValueBox::owned(bytes.into_arc()))
    }

    /// Underlying host buffer
    pub fn bytes(&self) -> Result<Bytes, BoundaryError> {
        self.0.unbox("bytes").map(Bytes::from_arc)
    }

    /// Overwrite or append the byte at a 1-based index
    pub fn set(&self, index: i64, value: i64) -> Result<(), BoundaryError> {
        let byte = u8::try_from(value).map_err(|_| BoundaryError::ByteRange(value))?;
        let bytes = self.bytes()?;
        let mut buf = bytes.write();
        let len = buf.len();
        match slot(index) {
            Some(i) if i < len => buf[i] = byte,
            Some(i) if i == len => buf.push(byte),
            _ => {
                return Err(BoundaryError::IndexOutOfRange {
                    kind: "bytes",
                    index,
                    len,
                })
            }
        }
        Ok(())
    }

    /// Byte at a 1-based index
    pub fn get(&self, index: i64) -> Result<Option<u8>, BoundaryError> {
        let bytes = self.bytes()?;
        let byte = slot(index).and_then(|i| bytes.read().get(i).copied());
        Ok(byte)
    }
}

impl UserData for BytesBox {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |_, this, index: i64| Ok(this.get(index)?));

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (index, value): (i64, i64)| Ok(this.set(index, value)?),
        );

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.bytes()?.read().len()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(Value::Bytes(this.bytes()?).to_string())
        });
    }
}

/// Script view of a record
pub struct RecordBox(ValueBox<dyn Record>);

impl RecordBox {
    /// The invocation's record; the host keeps it alive
    pub fn host(record: &Arc<dyn Record>) -> Self {
        RecordBox(ValueBox::host(record))
    }

    /// A record reached through another value
    pub fn owned(record: Arc<dyn Record>) -> Self {
        RecordBox(ValueBox::owned(record))
    }

    /// Underlying record
    pub fn record(&self) -> Result<Arc<dyn Record>, BoundaryError> {
        self.0.unbox("record")
    }
}

impl UserData for RecordBox {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, bin: String| {
            match this.record()?.get(&bin) {
                Some(value) => to_lua(lua, &value),
                None => Ok(LuaValue::Nil),
            }
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (bin, value): (String, LuaValue)| {
                let record = this.record()?;
                let result = if value.is_nil() {
                    record.remove(&bin)
                } else {
                    let value = from_lua(&value)?;
                    ensure_acyclic(&Value::Record(record.clone()), &value)?;
                    record.set(&bin, value)
                };
                result.map_err(BoundaryError::from)?;
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            let record = this.record()?;
            Ok(format!("Record({} bins)", record.bin_count()))
        });
    }
}

/// Script view of an input or output stream
pub struct StreamBox(ValueBox<dyn Stream>);

impl StreamBox {
    /// A stream owned by the host for the duration of the call
    pub fn host(stream: &Arc<dyn Stream>) -> Self {
        StreamBox(ValueBox::host(stream))
    }

    fn stream(&self) -> Result<Arc<dyn Stream>, BoundaryError> {
        self.0.unbox("stream")
    }
}

impl UserData for StreamBox {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("read", |lua, this, ()| match this.stream()?.read() {
            Some(value) => to_lua(lua, &value),
            None => Ok(LuaValue::Nil),
        });

        methods.add_method("write", |_, this, value: LuaValue| {
            let value = from_lua(&value)?;
            this.stream()?.write(value).map_err(BoundaryError::from)?;
            Ok(())
        });

        methods.add_method("readable", |_, this, ()| Ok(this.stream()?.is_readable()));
        methods.add_method("writable", |_, this, ()| Ok(this.stream()?.is_writable()));
    }
}

/// The per-call `host` handle
pub struct HostBox(ValueBox<dyn HostContext>);

impl HostBox {
    /// Borrow `host` for one invocation
    pub fn host(host: &Arc<dyn HostContext>) -> Self {
        HostBox(ValueBox::host(host))
    }

    fn context(&self) -> Result<Arc<dyn HostContext>, BoundaryError> {
        self.0.unbox("host")
    }
}

/// Result code returned to scripts for a host operation
fn status(result: host_types::HostResult<()>) -> i64 {
    match result {
        Ok(()) => 0,
        Err(err) => i64::from(err.code()),
    }
}

fn record_arg(record: &AnyUserData) -> mlua::Result<Arc<dyn Record>> {
    let record = record.borrow::<RecordBox>()?;
    Ok(record.record()?)
}

impl UserData for HostBox {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("create", |_, this, record: AnyUserData| {
            Ok(status(this.context()?.create(&record_arg(&record)?)))
        });
        methods.add_method("update", |_, this, record: AnyUserData| {
            Ok(status(this.context()?.update(&record_arg(&record)?)))
        });
        methods.add_method("remove", |_, this, record: AnyUserData| {
            Ok(status(this.context()?.remove(&record_arg(&record)?)))
        });
        methods.add_method("exists", |_, this, record: AnyUserData| {
            Ok(this.context()?.exists(&record_arg(&record)?))
        });
        methods.add_method("log", |_, this, (level, message): (i64, String)| {
            let level = LogLevel::from_code(level).unwrap_or(LogLevel::Info);
            this.context()?.log(level, &message);
            Ok(())
        });
    }
}

enum Step {
    One(Value),
    Two(Value, Value),
}

/// One-way traversal over a snapshot of a list or map.
///
/// Only `has_next`, `next` and `__call` are exposed; iterators cannot be
/// copied into host values.
pub struct ValueIterator {
    steps: Vec<Step>,
    pos: usize,
}

impl ValueIterator {
    /// Iterate the elements of `list`
    pub fn values(list: &List) -> Self {
        Self::from_steps(list.read().iter().cloned().map(Step::One).collect())
    }

    /// Iterate `(key, value)` pairs of `map` in key order
    pub fn entries(map: &Map) -> Self {
        let steps = map
            .read()
            .iter()
            .map(|(k, v)| Step::Two(Value::from(k.clone()), v.clone()))
            .collect();
        Self::from_steps(steps)
    }

    /// Iterate the keys of `map`
    pub fn keys(map: &Map) -> Self {
        let steps = map
            .read()
            .keys()
            .map(|k| Step::One(Value::from(k.clone())))
            .collect();
        Self::from_steps(steps)
    }

    /// Iterate the values of `map`
    pub fn map_values(map: &Map) -> Self {
        Self::from_steps(map.read().values().cloned().map(Step::One).collect())
    }

    fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps, pos: 0 }
    }

    fn has_next(&self) -> bool {
        self.pos < self.steps.len()
    }

    fn advance(&mut self, lua: &Lua) -> mlua::Result<Variadic<LuaValue>> {
        let Some(step) = self.steps.get(self.pos) else {
            return Ok(Variadic::new());
        };
        self.pos += 1;
        let out = match step {
            Step::One(value) => vec![to_lua(lua, value)?],
            Step::Two(key, value) => vec![to_lua(lua, key)?, to_lua(lua, value)?],
        };
        Ok(out.into_iter().collect())
    }
}

impl UserData for ValueIterator {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("has_next", |_, this, ()| Ok(this.has_next()));
        methods.add_method_mut("next", |lua, this, ()| this.advance(lua));
        methods.add_meta_method_mut(MetaMethod::Call, |lua, this, _: MultiValue| this.advance(lua));
    }
}
