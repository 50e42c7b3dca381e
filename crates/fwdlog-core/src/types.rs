//! Core types for fwdlog-core.
//!
//! This module defines the data structures shared by the codec, the client
//! and the receiver: the decoded [`EventRecord`], its [`Record`] payload, and
//! the dynamically typed [`FieldValue`] that payload values are made of.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::Serialize;

use crate::codec::{self, FrameError};

/// Payload of an event: string keys mapped to values.
///
/// Insertion order is kept so that re-encoding a decoded record produces the
/// same key order on the wire. Equality ignores order.
pub type Record = IndexMap<String, FieldValue>;

/// A single value inside a [`Record`].
///
/// Mirrors the MessagePack data model minus extension types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Nil,
    Bool(bool),
    /// Any integer that fits in an `i64`.
    Int(i64),
    /// Only used for integers above `i64::MAX`; see [`FieldValue::from`].
    UInt(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<FieldValue>),
    Map(Record),
}

impl FieldValue {
    /// Borrow the value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as an `i64`, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in type-mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Nil => "nil",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Int(_) | FieldValue::UInt(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "string",
            FieldValue::Bin(_) => "binary",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Int(n.into())
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Int(n.into())
    }
}

impl From<u64> for FieldValue {
    /// Values that fit in an `i64` become [`FieldValue::Int`] so that a
    /// decoded integer always compares equal to the one that was encoded.
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(n) => FieldValue::Int(n),
            Err(_) => FieldValue::UInt(n),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::Array(items)
    }
}

impl From<Record> for FieldValue {
    fn from(map: Record) -> Self {
        FieldValue::Map(map)
    }
}

/// Build a [`Record`] from key/value pairs, keeping their order.
///
/// ```rust
/// use fwdlog_core::record;
///
/// let payload = record([("from", "userA"), ("to", "userB")]);
/// assert_eq!(payload["from"].as_str(), Some("userA"));
/// ```
pub fn record<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Record
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// One decoded forward-protocol event: `[tag, timestamp, payload]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Dot-delimited stream label, e.g. `fluent.test`. Never empty.
    pub tag: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Structured event body.
    pub payload: Record,
}

impl EventRecord {
    /// Build a record, rejecting an empty tag.
    pub fn new(tag: impl Into<String>, timestamp: u64, payload: Record) -> Result<Self, FrameError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(FrameError::TypeMismatch {
                field: "tag",
                expected: "non-empty string",
                found: "empty string".to_string(),
            });
        }
        Ok(Self { tag, timestamp, payload })
    }

    /// Encode this record as one MessagePack frame.
    pub fn encode(&self) -> bytes::Bytes {
        codec::encode(&self.tag, self.timestamp, &self.payload)
    }

    /// Append this record's frame to `dst`.
    pub fn encode_into(&self, dst: &mut bytes::BytesMut) {
        codec::encode_into(&self.tag, self.timestamp, &self.payload, dst)
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.payload.get(key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
