use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Task priority. Stored in the backend as `1` (high) to `3` (low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Level 1.
    High,
    /// Level 2.
    #[default]
    Medium,
    /// Level 3.
    Low,
}

/// Error returned when a priority token or level is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid priority: {token} (expected high, medium, low or 1-3)")]
pub struct UnknownPriority {
    /// The rejected input.
    pub token: String,
}

impl Priority {
    /// Every priority from most to least urgent.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Numeric level stored in the backend.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    /// Map a numeric level back to a priority.
    #[must_use]
    pub const fn from_level(level: u64) -> Option<Self> {
        match level {
            1 => Some(Self::High),
            2 => Some(Self::Medium),
            3 => Some(Self::Low),
            _ => None,
        }
    }

    /// Human-friendly label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" | "1" => Ok(Self::High),
            "medium" | "med" | "m" | "2" => Ok(Self::Medium),
            "low" | "l" | "3" => Ok(Self::Low),
            _ => Err(UnknownPriority {
                token: s.to_owned(),
            }),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_u8(self.level())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = u64::deserialize(d)?;
        Self::from_level(level).ok_or_else(|| {
            serde::de::Error::custom(UnknownPriority {
                token: level.to_string(),
            })
        })
    }
}
