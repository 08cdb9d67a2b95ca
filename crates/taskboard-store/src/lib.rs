//! Document-backed task storage with a connection gatekeeper.
//!
//! [`ClientContext`] owns a [`DocumentBackend`] and tracks whether it is
//! usable; [`TaskStore`] maps task operations and live queries onto the
//! backend's documents.

mod backend;
/// Connection lifecycle and retry policy.
pub mod connection;
/// Document to task mapping.
pub mod convert;
/// Raw document shapes.
pub mod document;
/// Error types for store operations.
pub mod error;
/// In-process backend.
pub mod local;
mod task_store;

pub use backend::{DocumentBackend, SnapshotReceiver};
pub use connection::{ClientContext, ConnectionState, ConnectionStatus, RetryPolicy};
pub use convert::ConversionError;
pub use document::{Document, FieldValue, Fields, OrderBy, WireTimestamp};
pub use error::{BackendError, Operation, TaskError};
pub use local::LocalBackend;
pub use task_store::{DEFAULT_COLLECTION, Subscription, TaskSnapshots, TaskStore};
