use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::document::{Document, Fields, OrderBy};
use crate::error::BackendError;

/// Receiver of full, ordered collection snapshots.
pub type SnapshotReceiver = watch::Receiver<Arc<Vec<Document>>>;

/// Document database the task store talks to.
///
/// Futures are `Send` so callers can run them on spawned tasks.
pub trait DocumentBackend: Send + Sync + 'static {
    /// Establish the session. Called by the connection gatekeeper, possibly repeatedly.
    fn connect(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Tear the session down. Live queries stop receiving updates.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Insert a document and return its generated id.
    fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Merge `fields` into an existing document.
    ///
    /// Fails with [`BackendError::DocumentNotFound`] for unknown ids.
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Remove a document. Returns whether it existed.
    fn delete_document(&self, collection: &str, id: &str) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Register a live query.
    ///
    /// The receiver holds the current snapshot and is updated after every
    /// change. Dropping it releases the listener.
    ///
    /// # Errors
    /// Fails when the backend is not connected.
    fn listen(&self, collection: &str, order: &OrderBy) -> Result<SnapshotReceiver, BackendError>;
}
