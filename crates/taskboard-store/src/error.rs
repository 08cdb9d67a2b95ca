//! Error types for taskboard store operations.

use std::fmt;

use taskboard_core::{TaskId, ValidationError};
use thiserror::Error;

use crate::connection::ConnectionState;

/// Failures reported by a [`DocumentBackend`](crate::DocumentBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected.
    #[error("backend rejected credentials: {0}")]
    Unauthenticated(String),

    /// A call was made before `connect` succeeded.
    #[error("backend is not connected")]
    NotConnected,

    /// The addressed document does not exist.
    #[error("document {collection}/{id} not found")]
    DocumentNotFound {
        /// Collection that was searched.
        collection: String,
        /// Missing document id.
        id: String,
    },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data could not be encoded or decoded.
    #[error("invalid backend data: {0}")]
    Json(#[from] serde_json::Error),

    /// Other unclassified error.
    #[error("{0}")]
    Other(String),
}

/// Store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creating a task.
    Create,
    /// Updating a task.
    Update,
    /// Deleting a task.
    Delete,
    /// Registering the live query.
    Subscribe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create task",
            Self::Update => "update task",
            Self::Delete => "delete task",
            Self::Subscribe => "subscribe to tasks",
        })
    }
}

/// Errors surfaced by [`TaskStore`](crate::TaskStore) and
/// [`ClientContext`](crate::ClientContext).
#[derive(Error, Debug)]
pub enum TaskError {
    /// The connection is not ready; no network call was attempted.
    #[error("backend connection is not ready (state: {state})")]
    NotReady {
        /// State observed when the call was rejected.
        state: ConnectionState,
    },

    /// Initialization gave up after exhausting its attempts.
    #[error("could not connect to the backend after {attempts} attempts: {reason}")]
    ConnectionFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message.
        reason: String,
    },

    /// The backend call itself failed.
    #[error("failed to {op}: {source}")]
    Backend {
        /// Operation that was running.
        op: Operation,
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Input was rejected before reaching the backend.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
}

impl TaskError {
    /// Returns true for failures caused by connectivity rather than input.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::NotReady { .. } | Self::ConnectionFailed { .. } | Self::Backend { .. }
        )
    }

    pub(crate) const fn backend(op: Operation, source: BackendError) -> Self {
        Self::Backend { op, source }
    }
}
