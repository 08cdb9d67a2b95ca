use std::fmt;
use std::sync::Arc;

use taskboard_core::{CreateTaskInput, Task, TaskId, TaskPatch, TaskStatus};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{DocumentBackend, SnapshotReceiver};
use crate::connection::ClientContext;
use crate::convert::{create_fields, field, patch_fields, task_from_document};
use crate::document::{Document, OrderBy};
use crate::error::{BackendError, Operation, TaskError};

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "todos";

/// Task-level access to a document collection.
///
/// Every call goes through the connection gatekeeper: while it is not ready
/// calls fail fast without touching the backend.
pub struct TaskStore<B> {
    context: ClientContext<B>,
    collection: Arc<str>,
}

impl<B> Clone for TaskStore<B> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            collection: Arc::clone(&self.collection),
        }
    }
}

impl<B> fmt::Debug for TaskStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("collection", &self.collection)
            .field("context", &self.context)
            .finish()
    }
}

impl<B: DocumentBackend> TaskStore<B> {
    /// Store over `collection`.
    pub fn new(context: ClientContext<B>, collection: impl Into<String>) -> Self {
        Self {
            context,
            collection: Arc::from(collection.into()),
        }
    }

    /// Gatekeeper shared with this store.
    pub const fn context(&self) -> &ClientContext<B> {
        &self.context
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create a task. The backend assigns the id and both timestamps.
    ///
    /// # Errors
    /// Connection-class errors when not ready or when the write fails.
    pub async fn create(&self, input: CreateTaskInput) -> Result<TaskId, TaskError> {
        self.context.ensure_ready()?;
        let raw = self
            .context
            .backend()
            .add_document(&self.collection, create_fields(&input))
            .await
            .map_err(|err| TaskError::backend(Operation::Create, err))?;
        let id = TaskId::new(raw).map_err(|_| {
            TaskError::backend(
                Operation::Create,
                BackendError::Other("backend returned an empty document id".into()),
            )
        })?;
        info!(task = %id, "created task");
        Ok(id)
    }

    /// Apply `patch`; `updatedAt` is refreshed even when the patch is empty.
    ///
    /// # Errors
    /// [`TaskError::Validation`] for blank text fields, [`TaskError::NotFound`]
    /// for unknown ids, connection-class errors otherwise.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), TaskError> {
        let patch = patch.validate()?;
        self.context.ensure_ready()?;
        match self
            .context
            .backend()
            .update_document(&self.collection, id.as_str(), patch_fields(&patch))
            .await
        {
            Ok(()) => {
                info!(task = %id, "updated task");
                Ok(())
            }
            Err(BackendError::DocumentNotFound { .. }) => Err(TaskError::NotFound(id.clone())),
            Err(err) => Err(TaskError::backend(Operation::Update, err)),
        }
    }

    /// Delete a task. Unknown ids are not an error.
    ///
    /// # Errors
    /// Connection-class errors when not ready or when the write fails.
    pub async fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        self.context.ensure_ready()?;
        let existed = self
            .context
            .backend()
            .delete_document(&self.collection, id.as_str())
            .await
            .map_err(|err| TaskError::backend(Operation::Delete, err))?;
        if existed {
            info!(task = %id, "deleted task");
        } else {
            debug!(task = %id, "delete of unknown task ignored");
        }
        Ok(())
    }

    /// Set the completion flag.
    ///
    /// # Errors
    /// Same as [`update`](Self::update).
    pub async fn toggle_complete(&self, id: &TaskId, completed: bool) -> Result<(), TaskError> {
        self.update(id, TaskPatch::completion(completed)).await
    }

    /// Move a task to another column. Moving to completed also sets the flag.
    ///
    /// # Errors
    /// Same as [`update`](Self::update).
    pub async fn move_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), TaskError> {
        self.update(id, TaskPatch::move_to(status)).await
    }

    /// Lazy sequence of full snapshots, newest first.
    ///
    /// The live query is registered on the first [`TaskSnapshots::next`] call.
    pub fn snapshots(&self) -> TaskSnapshots<B> {
        TaskSnapshots {
            store: self.clone(),
            receiver: None,
            finished: false,
        }
    }

    /// Invoke `callback` with the full collection on every change.
    ///
    /// When the live query cannot be registered the callback receives a single
    /// empty collection and the subscription ends.
    pub fn subscribe<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Vec<Task>) + Send + 'static,
    {
        let mut snapshots = self.snapshots();
        let handle = tokio::spawn(async move {
            while let Some(result) = snapshots.next().await {
                match result {
                    Ok(tasks) => callback(tasks),
                    Err(err) => {
                        warn!(error = %err, "live query failed");
                        callback(Vec::new());
                        break;
                    }
                }
            }
        });
        Subscription { handle: Some(handle) }
    }

    fn listen(&self) -> Result<SnapshotReceiver, TaskError> {
        self.context.ensure_ready()?;
        self.context
            .backend()
            .listen(&self.collection, &OrderBy::descending(field::CREATED_AT))
            .map_err(|err| TaskError::backend(Operation::Subscribe, err))
    }
}

/// Snapshot sequence produced by [`TaskStore::snapshots`].
///
/// Dropping it releases the live query.
pub struct TaskSnapshots<B> {
    store: TaskStore<B>,
    receiver: Option<SnapshotReceiver>,
    finished: bool,
}

impl<B> fmt::Debug for TaskSnapshots<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSnapshots")
            .field("collection", &self.store.collection)
            .field("listening", &self.receiver.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<B: DocumentBackend> TaskSnapshots<B> {
    /// Wait for the next snapshot.
    ///
    /// The first call yields the current state right away. Returns `None` once
    /// the backend session ends or after a registration error was returned.
    /// Cancel safe.
    pub async fn next(&mut self) -> Option<Result<Vec<Task>, TaskError>> {
        if self.finished {
            return None;
        }
        let Some(receiver) = self.receiver.as_mut() else {
            return match self.store.listen() {
                Ok(mut receiver) => {
                    let docs = Arc::clone(&receiver.borrow_and_update());
                    self.receiver = Some(receiver);
                    debug!(collection = %self.store.collection, "listening for task snapshots");
                    Some(Ok(convert_all(&docs)))
                }
                Err(err) => {
                    self.finished = true;
                    Some(Err(err))
                }
            };
        };
        if receiver.changed().await.is_err() {
            self.finished = true;
            self.receiver = None;
            return None;
        }
        let docs = Arc::clone(&receiver.borrow_and_update());
        Some(Ok(convert_all(&docs)))
    }
}

/// Convert a snapshot, skipping documents that violate the schema.
fn convert_all(docs: &[Document]) -> Vec<Task> {
    docs.iter()
        .filter_map(|doc| match task_from_document(doc) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(document = %doc.id, error = %err, "skipping malformed task document");
                None
            }
        })
        .collect()
}

/// Handle for a callback registered with [`TaskStore::subscribe`].
///
/// Dropping the handle stops delivery as well.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop delivery. The callback never runs once this returns.
    pub async fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Returns true while snapshots may still be delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
