//! JSON translation for command-line values
//!
//! Arguments, records and stream inputs arrive as JSON text; results are
//! printed as JSON. Objects become maps with text keys, and integers that
//! fit in `i64` stay integers.

use crate::error::{CliError, CliResult};
use host_types::memory::MemoryRecord;
use host_types::{MapKey, Record, Value, MAX_DEPTH};
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::sync::Arc;

/// Convert a JSON document to a host value
pub fn to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::list(items.iter().map(to_value).collect()),
        Json::Object(fields) => Value::map(
            fields
                .iter()
                .map(|(k, v)| (MapKey::Text(k.clone()), to_value(v))),
        ),
    }
}

/// Convert a host value to JSON.
///
/// Bytes print as an array of numbers, pairs as two-element arrays and
/// records as an object of their bins. Non-finite doubles print as `null`,
/// as does anything nested deeper than [`MAX_DEPTH`].
pub fn from_value(value: &Value) -> Json {
    json_at(value, 0)
}

/// Bins of `record` as a JSON object
pub fn record_to_json(record: &dyn Record) -> Json {
    bins_at(record, 0)
}

fn json_at(value: &Value, depth: usize) -> Json {
    if depth >= MAX_DEPTH {
        return Json::Null;
    }
    let next = depth + 1;
    match value {
        Value::Nil => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(n) => Json::from(*n),
        Value::Double(n) => Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::Array(bytes.read().iter().map(|&b| Json::from(b)).collect()),
        Value::List(list) => Json::Array(list.read().iter().map(|v| json_at(v, next)).collect()),
        Value::Map(map) => Json::Object(
            map.read()
                .iter()
                .map(|(k, v)| (k.to_string(), json_at(v, next)))
                .collect(),
        ),
        Value::Record(record) => bins_at(record.as_ref(), next),
        Value::Pair(a, b) => Json::Array(vec![json_at(a, next), json_at(b, next)]),
    }
}

fn bins_at(record: &dyn Record, depth: usize) -> Json {
    let mut bins = JsonMap::new();
    for name in record.bin_names() {
        if let Some(value) = record.get(&name) {
            bins.insert(name, json_at(&value, depth));
        }
    }
    Json::Object(bins)
}

/// Parse each argument as JSON, falling back to plain text.
///
/// `5` is an integer and `"5"` is text, but a bare word such as `hello`
/// is accepted as text too.
pub fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| match serde_json::from_str::<Json>(arg) {
            Ok(json) => to_value(&json),
            Err(_) => Value::Text(arg.clone()),
        })
        .collect()
}

/// Build an in-memory record from a JSON object of bins
pub fn parse_record(text: &str) -> CliResult<Arc<dyn Record>> {
    let json: Json = serde_json::from_str(text)?;
    let Json::Object(fields) = json else {
        return Err(CliError::Input("record must be a JSON object".to_string()));
    };
    let bins: Vec<(String, Value)> = fields.iter().map(|(k, v)| (k.clone(), to_value(v))).collect();
    Ok(MemoryRecord::with_bins(bins.iter().map(|(k, v)| (k.as_str(), v.clone()))).into_handle())
}

/// Parse a JSON array of stream input values
pub fn parse_stream(text: &str) -> CliResult<Vec<Value>> {
    match serde_json::from_str::<Json>(text)? {
        Json::Array(items) => Ok(items.iter().map(to_value).collect()),
        _ => Err(CliError::Input("stream input must be a JSON array".to_string())),
    }
}
