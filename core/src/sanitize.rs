//! Caller-facing attribute values and their conversion to wire JSON.
//!
//! # Design
//! JSON has no date/time type and no NaN literal, so callers describe
//! attributes with `AttributeValue` and the dispatcher converts them with
//! `sanitize` right before serialization. Timestamps become integer Unix
//! seconds in UTC, non-finite floats become `null`. Raw JSON values pass
//! through untouched: sanitization only looks at top-level field values,
//! plus each element of a list-of-objects payload.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};

/// A single attribute as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// An instant in time, sent as epoch seconds.
    Timestamp(DateTime<Utc>),
    /// Already JSON-safe data (nested objects, arrays). Not inspected.
    Json(Value),
}

impl AttributeValue {
    fn into_json(self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(b),
            AttributeValue::Int(i) => Value::Number(i.into()),
            AttributeValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            AttributeValue::String(s) => Value::String(s),
            AttributeValue::Timestamp(ts) => Value::Number(epoch_seconds(&ts).into()),
            AttributeValue::Json(v) => v,
        }
    }
}

/// Unix seconds of `ts`. Sub-second precision is truncated toward the past.
pub fn epoch_seconds<Tz: TimeZone>(ts: &DateTime<Tz>) -> i64 {
    ts.timestamp()
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

macro_rules! int_attribute {
    ($($t:ty),*) => {
        $(impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                AttributeValue::Int(i64::from(v))
            }
        })*
    };
}

int_attribute!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(f64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// Naive date/times carry no zone; their wall clock is read as UTC.
impl From<NaiveDateTime> for AttributeValue {
    fn from(v: NaiveDateTime) -> Self {
        AttributeValue::Timestamp(v.and_utc())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for AttributeValue {
    fn from(v: DateTime<Tz>) -> Self {
        AttributeValue::Timestamp(v.with_timezone(&Utc))
    }
}

impl From<Value> for AttributeValue {
    fn from(v: Value) -> Self {
        AttributeValue::Json(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttributeValue::Null, Into::into)
    }
}

/// An open set of named attributes, e.g. customer traits or event data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Option<AttributeValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    /// Sanitized JSON object of these attributes.
    pub fn to_json(&self) -> Map<String, Value> {
        self.clone().into_json()
    }

    pub(crate) fn into_json(self) -> Map<String, Value> {
        self.0.into_iter().map(|(k, v)| (k, v.into_json())).collect()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<AttributeValue>, const N: usize> From<[(K, V); N]> for Attributes {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Body handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No request body at all.
    #[default]
    Empty,
    Object(Attributes),
    List(Vec<Attributes>),
    Value(AttributeValue),
}

impl From<Attributes> for Payload {
    fn from(attrs: Attributes) -> Self {
        Payload::Object(attrs)
    }
}

impl From<Vec<Attributes>> for Payload {
    fn from(list: Vec<Attributes>) -> Self {
        Payload::List(list)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Value(AttributeValue::Json(v))
    }
}

/// Convert a payload into JSON-safe data. `None` means "send no body".
///
/// Never fails: anything that is not a timestamp or a non-finite float is
/// passed through as-is.
pub fn sanitize(payload: Payload) -> Option<Value> {
    match payload {
        Payload::Empty => None,
        Payload::Object(attrs) => Some(Value::Object(attrs.into_json())),
        Payload::List(items) => Some(Value::Array(
            items.into_iter().map(|attrs| Value::Object(attrs.into_json())).collect(),
        )),
        Payload::Value(v) => Some(v.into_json()),
    }
}
