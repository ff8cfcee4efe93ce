//! Host value representation.
//!
//! Scalars are stored inline. Compound values (lists, maps, byte buffers)
//! are reference counted through [`Shared`], and records are shared trait
//! objects, so cloning a [`Value`] reserves a reference instead of copying.

use crate::record::Record;
use crate::shared::Shared;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Ordered list of values
pub type List = Shared<Vec<Value>>;

/// Key-value map with ordered keys
pub type Map = Shared<BTreeMap<MapKey, Value>>;

/// Mutable byte buffer
pub type Bytes = Shared<Vec<u8>>;

/// Deepest nesting walked when rendering or copying a value
pub const MAX_DEPTH: usize = 64;

/// Represents any value the host can exchange with a script.
///
/// # Examples
///
/// ```
/// use host_types::Value;
///
/// let five = Value::Integer(5);
/// assert_eq!(five.type_name(), "integer");
/// assert_eq!(five.as_integer(), Some(5));
/// assert_eq!(Value::from("bin").to_string(), "bin");
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Nil,
    /// Boolean
    Boolean(bool),
    /// Signed 64-bit integer
    Integer(i64),
    /// Double-precision float
    Double(f64),
    /// UTF-8 text
    Text(String),
    /// Byte buffer
    Bytes(Bytes),
    /// Ordered list
    List(List),
    /// Key-value map
    Map(Map),
    /// Record handle
    Record(Arc<dyn Record>),
    /// Two-element tuple, as produced by map traversal
    Pair(Box<Value>, Box<Value>),
}

impl Value {
    /// Short name of the value kind, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Text(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Pair(_, _) => "pair",
        }
    }

    /// Whether this is `Nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Integer payload, if any
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Text payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List payload, if any
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Map payload, if any
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Address of the storage behind a list, map or record
    fn storage(&self) -> Option<*const ()> {
        match self {
            Value::List(l) => Some(Arc::as_ptr(l.as_arc()) as *const ()),
            Value::Map(m) => Some(Arc::as_ptr(m.as_arc()) as *const ()),
            Value::Record(r) => Some(Arc::as_ptr(r) as *const ()),
            _ => None,
        }
    }

    /// Whether `target`'s storage is this value or is reachable from it.
    ///
    /// Storing `self` inside `target` forms a reference cycle exactly when
    /// this holds. Shared sub-values are visited once; only one lock is held
    /// at a time.
    pub fn reaches(&self, target: &Value) -> bool {
        let Some(goal) = target.storage() else {
            return false;
        };
        let mut seen = HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(value) = pending.pop() {
            if let Value::Pair(a, b) = value {
                pending.push(*a);
                pending.push(*b);
                continue;
            }
            let Some(addr) = value.storage() else {
                continue;
            };
            if addr == goal {
                return true;
            }
            if !seen.insert(addr) {
                continue;
            }
            match &value {
                Value::List(l) => pending.extend(l.read().iter().cloned()),
                Value::Map(m) => pending.extend(m.read().values().cloned()),
                Value::Record(r) => {
                    pending.extend(r.bin_names().iter().filter_map(|bin| r.get(bin)))
                }
                _ => {}
            }
        }
        false
    }

    /// Build a list value from its elements
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(List::new(items))
    }

    /// Build a map value from key-value entries
    pub fn map<I>(entries: I) -> Value
    where
        I: IntoIterator<Item = (MapKey, Value)>,
    {
        Value::Map(Map::new(entries.into_iter().collect()))
    }
}

impl List {
    /// Create a list holding `items`
    pub fn from_vec(items: Vec<Value>) -> Self {
        Shared::new(items)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            (Value::Pair(a1, a2), Value::Pair(b1, b2)) => a1 == b1 && a2 == b2,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Traced(self, 0), f)
    }
}

/// Renders values the way scripts see them through `tostring`.
///
/// Nesting deeper than [`MAX_DEPTH`] prints as `...`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Shown(self, 0), f)
    }
}

struct Shown<'a>(&'a Value, usize);

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Shown(value, depth) = *self;
        if depth >= MAX_DEPTH {
            return write!(f, "...");
        }
        match value {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "Bytes([{}])", b.read().len()),
            Value::List(l) => {
                write!(f, "List(")?;
                for (i, item) in l.read().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Shown(item, depth + 1))?;
                }
                write!(f, ")")
            }
            Value::Map(m) => {
                write!(f, "Map(")?;
                for (i, (k, v)) in m.read().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, Shown(v, depth + 1))?;
                }
                write!(f, ")")
            }
            Value::Record(_) => write!(f, "Record()"),
            Value::Pair(a, b) => write!(f, "({}, {})", Shown(a, depth + 1), Shown(b, depth + 1)),
        }
    }
}

struct Traced<'a>(&'a Value, usize);

impl fmt::Debug for Traced<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Traced(value, depth) = *self;
        if depth >= MAX_DEPTH {
            return write!(f, "...");
        }
        match value {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(&*b.read()).finish(),
            Value::List(l) => {
                let items = l.read();
                write!(f, "List(")?;
                f.debug_list()
                    .entries(items.iter().map(|item| Traced(item, depth + 1)))
                    .finish()?;
                write!(f, ")")
            }
            Value::Map(m) => {
                let entries = m.read();
                write!(f, "Map(")?;
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, Traced(v, depth + 1))))
                    .finish()?;
                write!(f, ")")
            }
            Value::Record(r) => write!(f, "Record(bins={})", r.bin_count()),
            Value::Pair(a, b) => f
                .debug_tuple("Pair")
                .field(&Traced(a, depth + 1))
                .field(&Traced(b, depth + 1))
                .finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(Bytes::new(bytes))
    }
}

/// Map keys are restricted to scalar kinds with a total order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// Boolean key
    Boolean(bool),
    /// Integer key
    Integer(i64),
    /// Text key
    Text(String),
    /// Raw bytes key
    Bytes(Vec<u8>),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Boolean(b) => write!(f, "{}", b),
            MapKey::Integer(n) => write!(f, "{}", n),
            MapKey::Text(s) => write!(f, "{}", s),
            MapKey::Bytes(b) => write!(f, "Bytes([{}])", b.len()),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Text(s.to_string())
    }
}

impl From<i64> for MapKey {
    fn from(n: i64) -> Self {
        MapKey::Integer(n)
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Boolean(b) => Value::Boolean(b),
            MapKey::Integer(n) => Value::Integer(n),
            MapKey::Text(s) => Value::Text(s),
            MapKey::Bytes(b) => Value::from(b),
        }
    }
}

impl TryFrom<&Value> for MapKey {
    type Error = &'static str;

    /// Fails with the value's type name when it cannot key a map.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(b) => Ok(MapKey::Boolean(*b)),
            Value::Integer(n) => Ok(MapKey::Integer(*n)),
            Value::Text(s) => Ok(MapKey::Text(s.clone())),
            Value::Bytes(b) => Ok(MapKey::Bytes(b.read().clone())),
            other => Err(other.type_name()),
        }
    }
}
