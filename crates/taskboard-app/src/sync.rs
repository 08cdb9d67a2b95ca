//! Live, filtered view of the task collection with user actions.

use std::future::Future;
use std::sync::Arc;

use taskboard_core::{
    BoardColumn, CreateTaskInput, DropOutcome, FilterUpdate, Task, TaskFilter, TaskId, TaskPatch, TaskSort,
    TaskStats, TaskStatus, derive_view, group_by_status, resolve_drop,
};
use taskboard_store::{
    ConnectionState, ConnectionStatus, DocumentBackend, TaskError, TaskSnapshots, TaskStore,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything a view needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    /// Filtered and sorted tasks.
    pub items: Arc<Vec<Task>>,
    /// Latest snapshot exactly as delivered, newest first.
    pub raw: Arc<Vec<Task>>,
    /// True until the first snapshot after (re)connecting arrives.
    pub is_loading: bool,
    /// Most recent error message.
    pub error: Option<String>,
    /// Active filter.
    pub filter: TaskFilter,
    /// Active sort.
    pub sort: TaskSort,
    /// Statistics over `raw`.
    pub stats: TaskStats,
    /// Gatekeeper status.
    pub connection: ConnectionStatus,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            items: Arc::default(),
            raw: Arc::default(),
            is_loading: true,
            error: None,
            filter: TaskFilter::default(),
            sort: TaskSort::default(),
            stats: TaskStats::default(),
            connection: ConnectionStatus::default(),
        }
    }
}

impl BoardState {
    /// Kanban columns over the raw snapshot, honouring only the priority filter.
    #[must_use]
    pub fn columns(&self) -> Vec<BoardColumn<'_>> {
        group_by_status(&self.raw, self.filter.priority)
    }

    /// Look a task up in the raw snapshot.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.raw.iter().find(|task| &task.id == id)
    }

    /// Returns true when the gatekeeper is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    fn set_raw(&mut self, tasks: Vec<Task>) {
        self.stats = TaskStats::from_tasks(&tasks);
        self.raw = Arc::new(tasks);
        self.refresh_view();
    }

    fn refresh_view(&mut self) {
        self.items = Arc::new(derive_view(&self.raw, &self.filter, &self.sort));
    }
}

/// Keeps a [`BoardState`] in sync with the store and exposes user actions.
///
/// The snapshot is only ever replaced by the live query; actions never touch
/// it directly.
pub struct TaskBoard<B> {
    store: TaskStore<B>,
    state: Arc<watch::Sender<BoardState>>,
    supervisor: Option<JoinHandle<()>>,
}

impl<B: DocumentBackend> TaskBoard<B> {
    /// Start connecting and mirroring. Must be called within a tokio runtime.
    pub fn start(store: TaskStore<B>) -> Self {
        let (state, _) = watch::channel(BoardState::default());
        let state = Arc::new(state);
        let supervisor = tokio::spawn(supervise(store.clone(), Arc::clone(&state)));
        store.context().start();
        Self {
            store,
            state,
            supervisor: Some(supervisor),
        }
    }

    /// Underlying store.
    pub const fn store(&self) -> &TaskStore<B> {
        &self.store
    }

    /// Current state.
    pub fn state(&self) -> BoardState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn changes(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Wait until `predicate` holds for the state.
    ///
    /// # Errors
    /// Returns [`TaskError::NotReady`] when the board stops publishing first.
    pub async fn wait_until(&self, predicate: impl FnMut(&BoardState) -> bool) -> Result<BoardState, TaskError> {
        let mut rx = self.changes();
        rx.wait_for(predicate)
            .await
            .map(|state| state.clone())
            .map_err(|_| TaskError::NotReady {
                state: ConnectionState::Uninitialized,
            })
    }

    /// Wait for the first snapshot, or for the connection to give up.
    ///
    /// # Errors
    /// Returns [`TaskError::ConnectionFailed`] when every attempt failed.
    pub async fn loaded(&self) -> Result<BoardState, TaskError> {
        let state = self.wait_until(|state| !state.is_loading).await?;
        match state.connection.state {
            ConnectionState::Failed => Err(state.connection.error().unwrap_or(TaskError::NotReady {
                state: ConnectionState::Failed,
            })),
            _ => Ok(state),
        }
    }

    /// Create a task.
    ///
    /// # Errors
    /// Propagates the store error after recording it.
    pub async fn create(&self, input: CreateTaskInput) -> Result<TaskId, TaskError> {
        self.run(self.store.create(input)).await
    }

    /// Apply a patch to a task.
    ///
    /// # Errors
    /// Propagates the store error after recording it.
    pub async fn edit(&self, id: &TaskId, patch: TaskPatch) -> Result<(), TaskError> {
        self.run(self.store.update(id, patch)).await
    }

    /// Delete a task.
    ///
    /// # Errors
    /// Propagates the store error after recording it.
    pub async fn remove(&self, id: &TaskId) -> Result<(), TaskError> {
        self.run(self.store.delete(id)).await
    }

    /// Set the completion flag.
    ///
    /// # Errors
    /// Propagates the store error after recording it.
    pub async fn toggle_complete(&self, id: &TaskId, completed: bool) -> Result<(), TaskError> {
        self.run(self.store.toggle_complete(id, completed)).await
    }

    /// Move a task to another column.
    ///
    /// # Errors
    /// Propagates the store error after recording it.
    pub async fn move_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), TaskError> {
        self.run(self.store.move_status(id, status)).await
    }

    /// Handle a kanban drop of `card` onto the `target` column.
    ///
    /// Drops on the card's own column and unknown cards do nothing.
    ///
    /// # Errors
    /// Propagates the store error after recording it.
    pub async fn drop_on_column(&self, card: &TaskId, target: TaskStatus) -> Result<DropOutcome, TaskError> {
        let outcome = resolve_drop(&self.state.borrow().raw, card, target);
        if let DropOutcome::Update { task, patch } = &outcome {
            self.run(self.store.update(task, patch.clone())).await?;
        }
        Ok(outcome)
    }

    /// Merge a partial filter change.
    pub fn set_filter(&self, update: FilterUpdate) {
        self.state.send_if_modified(|state| {
            let mut filter = state.filter.clone();
            filter.merge(update);
            if filter == state.filter {
                return false;
            }
            state.filter = filter;
            state.refresh_view();
            true
        });
    }

    /// Replace the whole filter.
    pub fn replace_filter(&self, filter: TaskFilter) {
        self.state.send_if_modified(|state| {
            if filter == state.filter {
                return false;
            }
            state.filter = filter;
            state.refresh_view();
            true
        });
    }

    /// Change the sort.
    pub fn set_sort(&self, sort: TaskSort) {
        self.state.send_if_modified(|state| {
            if sort == state.sort {
                return false;
            }
            state.sort = sort;
            state.refresh_view();
            true
        });
    }

    /// Dismiss the current error.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    /// Restart a failed connection. Returns whether a new run started.
    pub fn retry_connection(&self) -> bool {
        let started = self.store.context().retry();
        if started {
            self.state.send_modify(|state| {
                state.is_loading = true;
                state.error = None;
            });
        }
        started
    }

    /// Stop mirroring and disconnect. No state change is published afterwards.
    pub async fn close(mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
            let _ = supervisor.await;
        }
        self.store.context().close().await;
        info!("task board closed");
    }

    async fn run<T>(&self, action: impl Future<Output = Result<T, TaskError>>) -> Result<T, TaskError> {
        self.clear_error();
        let result = action.await;
        if let Err(err) = &result {
            warn!(error = %err, "task action failed");
            let message = err.to_string();
            self.state.send_modify(|state| state.error = Some(message));
        }
        result
    }
}

impl<B> Drop for TaskBoard<B> {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
        }
    }
}

/// Follow the gatekeeper and keep one live query open while it is ready.
async fn supervise<B: DocumentBackend>(store: TaskStore<B>, state: Arc<watch::Sender<BoardState>>) {
    let mut status_rx = store.context().status();
    let mut snapshots: Option<TaskSnapshots<B>> = None;
    let mut listening: Option<u64> = None;
    loop {
        let status = status_rx.borrow_and_update().clone();
        publish_status(&state, &status);
        if status.is_ready() {
            if listening != Some(status.generation) {
                info!(generation = status.generation, "subscribing to task snapshots");
                snapshots = Some(store.snapshots());
                listening = Some(status.generation);
            }
        } else if listening.take().is_some() {
            debug!(state = %status.state, "dropping task subscription");
            snapshots = None;
        }

        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            next = next_snapshot(&mut snapshots) => match next {
                Some(Ok(tasks)) => {
                    debug!(count = tasks.len(), "received task snapshot");
                    state.send_modify(|state| {
                        state.set_raw(tasks);
                        state.is_loading = false;
                        state.error = None;
                    });
                }
                Some(Err(err)) => {
                    warn!(error = %err, "task subscription failed");
                    let message = err.to_string();
                    state.send_modify(|state| {
                        state.error = Some(message);
                        state.is_loading = false;
                    });
                }
                None => snapshots = None,
            },
        }
    }
}

async fn next_snapshot<B: DocumentBackend>(
    snapshots: &mut Option<TaskSnapshots<B>>,
) -> Option<Result<Vec<Task>, TaskError>> {
    match snapshots {
        Some(snapshots) => snapshots.next().await,
        None => std::future::pending().await,
    }
}

fn publish_status(state: &watch::Sender<BoardState>, status: &ConnectionStatus) {
    state.send_if_modified(|state| {
        if state.connection == *status {
            return false;
        }
        state.connection = status.clone();
        match status.state {
            ConnectionState::Failed => {
                state.error = status.error().map(|err| err.to_string());
                state.is_loading = false;
            }
            ConnectionState::Initializing => state.is_loading = true,
            ConnectionState::Uninitialized | ConnectionState::Ready => {}
        }
        true
    });
}
