//! Raw document shapes exchanged with a backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A stored document as delivered by a live query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Backend-assigned id.
    pub id: String,
    /// Field map; expected to be a JSON object.
    pub data: Value,
}

/// Value written to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Store this value as is.
    Value(Value),
    /// Replace with the backend's commit timestamp.
    ServerTimestamp,
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Fields of a write, keyed by wire name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Native timestamp encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTimestamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Sub-second part.
    pub nanoseconds: u32,
}

impl WireTimestamp {
    /// Encode a point in time.
    #[must_use]
    pub const fn from_datetime(at: OffsetDateTime) -> Self {
        Self {
            seconds: at.unix_timestamp(),
            nanoseconds: at.nanosecond(),
        }
    }

    /// Decode, returning `None` when out of range.
    #[must_use]
    pub fn to_datetime(self) -> Option<OffsetDateTime> {
        if self.nanoseconds >= 1_000_000_000 {
            return None;
        }
        let nanos = i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanoseconds);
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }

    /// JSON form stored in documents.
    #[must_use]
    pub fn to_value(self) -> Value {
        serde_json::json!({ "seconds": self.seconds, "nanoseconds": self.nanoseconds })
    }
}

/// Parse a timestamp field: native objects or RFC 3339 strings.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(raw) => OffsetDateTime::parse(raw, &Rfc3339).ok(),
        Value::Object(_) => serde_json::from_value::<WireTimestamp>(value.clone())
            .ok()
            .and_then(WireTimestamp::to_datetime),
        _ => None,
    }
}

/// Ordering requested for a live query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Timestamp field to order by.
    pub field: String,
    /// Newest first when true.
    pub descending: bool,
}

impl OrderBy {
    /// Newest-first ordering on `field`.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}
