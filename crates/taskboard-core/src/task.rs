use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::id::TaskId;
use crate::priority::Priority;
use crate::status::TaskStatus;

/// A task as mirrored from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend-assigned identifier.
    pub id: TaskId,
    /// Short title, never empty.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Priority level.
    pub priority: Priority,
    /// Completion flag.
    pub completed: bool,
    /// Kanban column.
    pub status: TaskStatus,
    /// Server timestamp of creation.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Server timestamp of the latest write. Never earlier than `created_at`.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A required field failed caller-side validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human-readable message.
    pub message: &'static str,
}

impl ValidationError {
    pub(crate) const fn required(field: &'static str) -> Self {
        Self {
            field,
            message: "must not be empty",
        }
    }
}

/// Validated input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskInput {
    title: String,
    description: String,
    priority: Priority,
    status: TaskStatus,
}

impl CreateTaskInput {
    /// Build a create request, rejecting blank titles and descriptions.
    ///
    /// The status starts as [`TaskStatus::Todo`].
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming the first blank field.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Result<Self, ValidationError> {
        let title = require_text("title", title.into())?;
        let description = require_text("description", description.into())?;
        Ok(Self {
            title,
            description,
            priority,
            status: TaskStatus::Todo,
        })
    }

    /// Start the task in a specific kanban column.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Validated title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Validated description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Requested priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Initial status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }
}

pub(crate) fn require_text(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_owned())
    }
}
