//! Decoded channel values and data packets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Values to encode, keyed by channel name.
pub type Readings = HashMap<String, ReadingValue>;

/// A single channel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    /// Float and scaled-integer channels
    Number(f64),
    /// Timestamp channels, microsecond resolution
    Timestamp(DateTime<Utc>),
    /// String channels
    Text(String),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "string",
        }
    }
}

impl From<f64> for ReadingValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<f32> for ReadingValue {
    fn from(v: f32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i64> for ReadingValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<DateTime<Utc>> for ReadingValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<String> for ReadingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ReadingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl std::fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// A decoded data packet: one value per channel, in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataPacket {
    values: Vec<(String, ReadingValue)>,
}

impl DataPacket {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, name: &str, value: ReadingValue) {
        self.values.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ReadingValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReadingValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    /// Convert into readings that can be passed back to `encode`.
    pub fn into_readings(self) -> Readings {
        self.values.into_iter().collect()
    }
}

// Serialized as a JSON object that keeps schema order.
impl Serialize for DataPacket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
