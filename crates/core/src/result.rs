use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single measurement handed to a [`ResultWriter`](crate::ResultWriter).
///
/// A record with neither value nor error is the "empty" result returned to
/// direct requests when a plugin produced no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    #[serde(rename = "itemid")]
    pub item_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "lastlogsize", default, skip_serializing_if = "Option::is_none")]
    pub last_logsize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i32>,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn with_value(item_id: u64, ts: DateTime<Utc>, value: impl Into<String>) -> Self {
        Self {
            item_id,
            value: Some(value.into()),
            ts,
            ..Default::default()
        }
    }

    pub fn failure(item_id: u64, ts: DateTime<Utc>, error: impl fmt::Display) -> Self {
        Self {
            item_id,
            ts,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.error.is_none()
    }
}

/// A scalar returned by an exporter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Unsigned(u64),
    Integer(i64),
    Float(f64),
    Json(serde_json::Value),
    /// A fully built record, forwarded untouched. Used by plugins that need
    /// to report `last_logsize`/`mtime` alongside the value.
    Result(ItemResult),
}

impl Value {
    /// Text form of a scalar; `None` for pre-built results.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Unsigned(n) => Some(n.to_string()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Float(f) => Some(format!("{:.6}", f)),
            Value::Json(serde_json::Value::String(s)) => Some(s.clone()),
            Value::Json(v) => Some(v.to_string()),
            Value::Result(_) => None,
        }
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

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Unsigned(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<ItemResult> for Value {
    fn from(r: ItemResult) -> Self {
        Value::Result(r)
    }
}

/// What an exporter returns on success, when it returns anything.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportValue {
    Single(Value),
    Multiple(Vec<Value>),
}

impl ExportValue {
    pub fn single(value: impl Into<Value>) -> Self {
        ExportValue::Single(value.into())
    }

    pub fn multiple<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ExportValue::Multiple(values.into_iter().map(Into::into).collect())
    }
}

/// Stamp a value with its item id and collection time.
pub fn value_to_result(item_id: u64, ts: DateTime<Utc>, value: Value) -> ItemResult {
    match value {
        Value::Result(result) => result,
        other => ItemResult {
            item_id,
            value: other.render(),
            ts,
            ..Default::default()
        },
    }
}

/// One item in a watcher batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "itemid")]
    pub item_id: u64,
    pub key: String,
    #[serde(default)]
    pub delay: String,
    #[serde(rename = "lastlogsize", default, skip_serializing_if = "Option::is_none")]
    pub last_logsize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i32>,
}
