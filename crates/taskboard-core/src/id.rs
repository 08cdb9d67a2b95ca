use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Identifier of a task, assigned by the backend when the document is created.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TaskId(String);

/// Error returned when parsing an empty identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task id must not be empty")]
pub struct EmptyTaskId;

impl TaskId {
    /// Wrap a backend-issued document identifier.
    ///
    /// # Errors
    /// Returns [`EmptyTaskId`] when the identifier is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyTaskId> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(EmptyTaskId);
        }
        Ok(Self(raw))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = EmptyTaskId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for TaskId {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
