//! In-process document backend with optional JSON persistence.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{DocumentBackend, SnapshotReceiver};
use crate::document::{Document, FieldValue, Fields, OrderBy, WireTimestamp, parse_timestamp};
use crate::error::BackendError;

/// Document backend kept in memory, optionally mirrored to a JSON file.
///
/// It behaves like a remote database from the store's point of view: writes
/// require a session, timestamps are assigned here, and live queries receive
/// the full ordered collection after every change. Connectivity can be
/// toggled to exercise failure paths.
///
/// File I/O is plain `std::fs` under the state lock. The files are small and
/// local, so the brief block of a runtime worker is accepted.
#[derive(Debug)]
pub struct LocalBackend {
    api_key: String,
    path: Option<PathBuf>,
    poll_interval: std::time::Duration,
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    connected: bool,
    online: bool,
    failing_connects: u32,
    connect_attempts: u32,
    collections: BTreeMap<String, Vec<Document>>,
    listeners: Vec<Listener>,
    last_stamp: Option<OffsetDateTime>,
    /// Modification time of the file as last read or written here.
    file_modified: Option<SystemTime>,
    polling: bool,
}

#[derive(Debug)]
struct Listener {
    collection: String,
    order: OrderBy,
    sender: watch::Sender<Arc<Vec<Document>>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedData {
    collections: BTreeMap<String, Vec<Document>>,
}

/// How often a persisted backend checks its file for writes by other processes.
pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

impl LocalBackend {
    /// Backend that keeps everything in memory.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            path: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Arc::new(Mutex::new(State {
                connected: false,
                online: true,
                failing_connects: 0,
                connect_attempts: 0,
                collections: BTreeMap::new(),
                listeners: Vec::new(),
                last_stamp: None,
                file_modified: None,
                polling: false,
            })),
        }
    }

    /// Backend persisted to `path`, loaded on every successful connect.
    ///
    /// While a live query is open the file is polled, so writes made by other
    /// processes reach the listeners.
    pub fn persistent(api_key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(api_key)
        }
    }

    /// Change how often the backing file is polled.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// File backing this backend, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Make the next `count` connection attempts fail as unavailable.
    pub fn fail_next_connects(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_connects = count;
        }
    }

    /// Simulate losing or regaining the network. While offline every call fails.
    pub fn set_online(&self, online: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.online = online;
        }
    }

    /// Number of connection attempts seen so far.
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().map_or(0, |state| state.connect_attempts)
    }

    /// Number of live queries whose receiver is still alive.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.lock().map_or(0, |mut state| {
            state.listeners.retain(|listener| !listener.sender.is_closed());
            state.listeners.len()
        })
    }

    /// Store a document verbatim, bypassing field resolution, and notify listeners.
    ///
    /// # Errors
    /// Fails when the state cannot be persisted.
    pub fn insert_raw(&self, collection: &str, id: impl Into<String>, data: Value) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let mut docs = state.documents(collection);
        docs.push(Document { id: id.into(), data });
        self.commit(&mut state, collection, docs)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Other("local backend state lock poisoned".into()))
    }

    /// Lock and check that a session is open.
    fn session(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        let state = self.lock()?;
        if !state.online {
            return Err(BackendError::Unavailable("network unreachable".into()));
        }
        if !state.connected {
            return Err(BackendError::NotConnected);
        }
        Ok(state)
    }

    /// Replace `collection` with `docs` once they are persisted, then notify.
    ///
    /// A failed write leaves the previous contents in place.
    fn commit(&self, state: &mut State, collection: &str, docs: Vec<Document>) -> Result<(), BackendError> {
        let previous = state.collections.insert(collection.to_owned(), docs);
        if let Err(err) = self.persist(state) {
            match previous {
                Some(previous) => state.collections.insert(collection.to_owned(), previous),
                None => state.collections.remove(collection),
            };
            return Err(err);
        }
        state.notify(collection);
        Ok(())
    }

    fn persist(&self, state: &mut State) -> Result<(), BackendError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let data = PersistedData {
            collections: state.collections.clone(),
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&data)?)?;
        fs::rename(&tmp, path)?;
        state.file_modified = modified(path);
        Ok(())
    }

    /// Start polling the file unless a poller already runs.
    fn spawn_poller(&self, state: &mut State) {
        let Some(path) = &self.path else {
            return;
        };
        if state.polling {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        state.polling = true;
        runtime.spawn(poll_file(Arc::downgrade(&self.state), path.clone(), self.poll_interval));
    }
}

fn load(path: &Path) -> Result<Option<PersistedData>, BackendError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Reload the file whenever its modification time moves, for as long as a
/// live query is open.
async fn poll_file(state: Weak<Mutex<State>>, path: PathBuf, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = state.upgrade() else {
            break;
        };
        let Ok(mut state) = shared.lock() else {
            break;
        };
        if !state.has_listeners() {
            state.polling = false;
            debug!(path = %path.display(), "stopped polling data file");
            break;
        }
        if let Err(err) = state.reload(&path) {
            warn!(path = %path.display(), error = %err, "failed to reload data file");
        }
    }
}

impl State {
    fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.get(collection).cloned().unwrap_or_default()
    }

    fn has_listeners(&mut self) -> bool {
        self.listeners.retain(|listener| !listener.sender.is_closed());
        self.connected && !self.listeners.is_empty()
    }

    /// Pick up writes made to `path` by someone else.
    fn reload(&mut self, path: &Path) -> Result<(), BackendError> {
        let current = modified(path);
        if current.is_none() || current == self.file_modified {
            return Ok(());
        }
        let Some(data) = load(path)? else {
            return Ok(());
        };
        self.collections = data.collections;
        self.file_modified = current;
        debug!(path = %path.display(), "reloaded data file");
        let collections: BTreeSet<String> = self.listeners.iter().map(|listener| listener.collection.clone()).collect();
        for collection in collections {
            self.notify(&collection);
        }
        Ok(())
    }

    /// Server timestamp, strictly increasing across writes.
    fn stamp(&mut self) -> OffsetDateTime {
        let mut now = OffsetDateTime::now_utc();
        if let Some(last) = self.last_stamp
            && now <= last
        {
            now = last + Duration::microseconds(1);
        }
        self.last_stamp = Some(now);
        now
    }

    fn resolve(&mut self, fields: Fields) -> Map<String, Value> {
        let stamp = WireTimestamp::from_datetime(self.stamp()).to_value();
        fields
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Value(value) => value,
                    FieldValue::ServerTimestamp => stamp.clone(),
                };
                (name, value)
            })
            .collect()
    }

    fn snapshot(&self, collection: &str, order: &OrderBy) -> Arc<Vec<Document>> {
        let docs = self.collections.get(collection).map_or(&[][..], Vec::as_slice);
        Arc::new(ordered(docs, order))
    }

    fn notify(&mut self, collection: &str) {
        self.listeners.retain(|listener| !listener.sender.is_closed());
        for listener in self.listeners.iter().filter(|listener| listener.collection == collection) {
            listener.sender.send_replace(self.snapshot(collection, &listener.order));
        }
    }
}

/// Order by a timestamp field; documents without a parseable value go last
/// and ties keep insertion order.
fn ordered(docs: &[Document], order: &OrderBy) -> Vec<Document> {
    let mut keyed: Vec<_> = docs
        .iter()
        .map(|doc| (doc.data.get(&order.field).and_then(parse_timestamp), doc))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) if order.descending => b.cmp(a),
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    keyed.into_iter().map(|(_, doc)| doc.clone()).collect()
}

impl DocumentBackend for LocalBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        state.connect_attempts += 1;
        if !state.online {
            return Err(BackendError::Unavailable("network unreachable".into()));
        }
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(BackendError::Unavailable("backend did not respond".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(BackendError::Unauthenticated("api key is empty".into()));
        }
        if let Some(path) = &self.path
            && let Some(data) = load(path)?
        {
            state.collections = data.collections;
            state.file_modified = modified(path);
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.connected = false;
            state.listeners.clear();
        }
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String, BackendError> {
        let mut state = self.session()?;
        let id = Uuid::now_v7().to_string();
        let data = state.resolve(fields);
        let mut docs = state.documents(collection);
        docs.push(Document {
            id: id.clone(),
            data: Value::Object(data),
        });
        self.commit(&mut state, collection, docs)?;
        Ok(id)
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError> {
        let mut state = self.session()?;
        let mut docs = state.documents(collection);
        let doc = docs
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| BackendError::DocumentNotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            })?;
        let resolved = state.resolve(fields);
        if !doc.data.is_object() {
            doc.data = Value::Object(Map::new());
        }
        if let Value::Object(data) = &mut doc.data {
            data.extend(resolved);
        }
        self.commit(&mut state, collection, docs)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, BackendError> {
        let mut state = self.session()?;
        let mut docs = state.documents(collection);
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        if docs.len() == before {
            return Ok(false);
        }
        self.commit(&mut state, collection, docs)?;
        Ok(true)
    }

    fn listen(&self, collection: &str, order: &OrderBy) -> Result<SnapshotReceiver, BackendError> {
        let mut state = self.session()?;
        let (sender, receiver) = watch::channel(state.snapshot(collection, order));
        state.listeners.push(Listener {
            collection: collection.to_owned(),
            order: order.clone(),
            sender,
        });
        debug!(collection, listeners = state.listeners.len(), "registered live query");
        self.spawn_poller(&mut state);
        Ok(receiver)
    }
}
