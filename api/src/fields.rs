//! First-present lookup over the many field names upstream records use for
//! the same thing.

use serde::Serialize;
use serde_json::Value;

/// Returns the first alias that is present and not null.
pub fn first_present<'a>(record: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .find(|value| !value.is_null())
}

/// Like [`first_present`], rendered as text. Numbers and booleans are
/// stringified; arrays and objects are not considered text.
pub fn first_string(record: &Value, aliases: &[&str]) -> Option<String> {
    first_present(record, aliases).and_then(as_text)
}

/// Like [`first_string`] but treats an empty string as absent.
pub fn first_non_empty(record: &Value, aliases: &[&str]) -> Option<String> {
    first_string(record, aliases).filter(|s| !s.is_empty())
}

pub fn first_i64(record: &Value, aliases: &[&str]) -> Option<i64> {
    first_present(record, aliases).and_then(as_i64)
}

/// First alias holding an actual boolean. Other value types are skipped.
pub fn first_bool(record: &Value, aliases: &[&str]) -> Option<bool> {
    aliases
        .iter()
        .find_map(|alias| record.get(alias).and_then(Value::as_bool))
}

pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Items of a listing that is either a bare array or `{ items: [...] }`.
pub fn items_of(payload: &Value) -> Vec<Value> {
    list_under(payload, "items")
}

/// Array payload, or the array stored under `key` of an object payload.
pub fn list_under(payload: &Value, key: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get(key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Record identifier as handed out by the upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Number),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    /// Numeric form, used when the id has to be passed back upstream.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordId::Number(n) => Some(*n),
            RecordId::Text(s) => s.trim().parse().ok(),
        }
    }
}

pub fn first_id(record: &Value, aliases: &[&str]) -> Option<RecordId> {
    first_present(record, aliases).and_then(RecordId::from_value)
}
