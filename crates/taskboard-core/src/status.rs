use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Workflow status of a task, one per kanban column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started yet.
    #[default]
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Finished.
    Completed,
}

/// Error returned when a status token is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status: {token} (expected todo, in-progress or completed)")]
pub struct UnknownStatus {
    /// The rejected input.
    pub token: String,
}

impl TaskStatus {
    /// Every status in board order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Completed];

    /// Value stored in the backend document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    /// Human-friendly label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// Parse the backend wire value. Only the exact wire spelling is accepted.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" | "inprogress" | "doing" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(UnknownStatus {
                token: s.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_match_backend_schema() {
        assert_eq!(TaskStatus::Todo.as_str(), "todo");
        assert_eq!(TaskStatus::InProgress.as_str(), "in-progress");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
        assert_eq!(TaskStatus::from_wire("in-progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_wire("In Progress"), None);
    }

    #[test]
    fn user_tokens_are_normalized() {
        for token in ["in-progress", "IN PROGRESS", "in_progress", "doing"] {
            assert_eq!(token.parse::<TaskStatus>(), Ok(TaskStatus::InProgress), "{token}");
        }
        assert_eq!("done".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert!("blocked".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress)
            .unwrap_or_else(|err| panic!("serialize status: {err}"));
        assert_eq!(json, "\"in-progress\"");
    }
}
