//! Round trips through the task store against the in-process backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use taskboard_core::{CreateTaskInput, Priority, Task, TaskId, TaskPatch, TaskStatus};
use taskboard_store::{
    ClientContext, ConnectionState, DEFAULT_COLLECTION, LocalBackend, RetryPolicy, TaskError, TaskSnapshots,
    TaskStore,
};

async fn ready_store() -> TaskStore<LocalBackend> {
    let ctx = ClientContext::new(LocalBackend::new("demo-key"), RetryPolicy::default());
    ctx.connect().await.unwrap_or_else(|err| panic!("connect: {err}"));
    TaskStore::new(ctx, DEFAULT_COLLECTION)
}

fn input(title: &str, priority: Priority) -> CreateTaskInput {
    CreateTaskInput::new(title, format!("{title} details"), priority).unwrap_or_else(|err| panic!("input: {err}"))
}

async fn next(snapshots: &mut TaskSnapshots<LocalBackend>) -> Vec<Task> {
    tokio::time::timeout(Duration::from_secs(5), snapshots.next())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for a snapshot"))
        .unwrap_or_else(|| panic!("snapshot stream ended"))
        .unwrap_or_else(|err| panic!("snapshot error: {err}"))
}

#[tokio::test]
async fn create_round_trip_yields_defaults() {
    let store = ready_store().await;
    let mut snapshots = store.snapshots();
    assert!(next(&mut snapshots).await.is_empty());

    let id = store
        .create(input("A", Priority::High))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    let tasks = next(&mut snapshots).await;
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.id, id);
    assert_eq!(task.title, "A");
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.status, TaskStatus::Todo);
    assert!(!task.completed);
    assert!(task.updated_at >= task.created_at);
}

#[tokio::test]
async fn snapshots_are_newest_first() {
    let store = ready_store().await;
    for title in ["t3", "t2", "t1"] {
        store
            .create(input(title, Priority::Low))
            .await
            .unwrap_or_else(|err| panic!("create: {err}"));
    }
    let tasks = next(&mut store.snapshots()).await;
    let titles: Vec<_> = tasks.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, ["t1", "t2", "t3"]);
}

#[tokio::test]
async fn updates_refresh_timestamps_and_force_completion() {
    let store = ready_store().await;
    let id = store
        .create(input("Report", Priority::Medium))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    let mut snapshots = store.snapshots();
    let created = next(&mut snapshots).await.remove(0);

    store
        .toggle_complete(&id, true)
        .await
        .unwrap_or_else(|err| panic!("toggle: {err}"));
    let toggled = next(&mut snapshots).await.remove(0);
    assert!(toggled.completed);
    assert_eq!(toggled.status, TaskStatus::Todo);
    assert!(toggled.updated_at > created.updated_at);

    store
        .toggle_complete(&id, false)
        .await
        .unwrap_or_else(|err| panic!("toggle: {err}"));
    next(&mut snapshots).await;
    store
        .move_status(&id, TaskStatus::Completed)
        .await
        .unwrap_or_else(|err| panic!("move: {err}"));
    let moved = next(&mut snapshots).await.remove(0);
    assert_eq!(moved.status, TaskStatus::Completed);
    assert!(moved.completed);

    store
        .update(&id, TaskPatch::default())
        .await
        .unwrap_or_else(|err| panic!("empty patch: {err}"));
    let touched = next(&mut snapshots).await.remove(0);
    assert!(touched.updated_at > moved.updated_at);
    assert_eq!(touched.title, "Report");
}

#[tokio::test]
async fn unknown_ids_and_blank_fields() {
    let store = ready_store().await;
    let ghost = TaskId::new("ghost").unwrap_or_else(|err| panic!("id: {err}"));

    let Err(err) = store.toggle_complete(&ghost, true).await else {
        panic!("update of unknown task must fail");
    };
    assert!(matches!(err, TaskError::NotFound(ref id) if *id == ghost));

    store
        .delete(&ghost)
        .await
        .unwrap_or_else(|err| panic!("delete of unknown id is a no-op: {err}"));

    let blank = TaskPatch {
        title: Some("   ".into()),
        ..TaskPatch::default()
    };
    let Err(err) = store.update(&ghost, blank).await else {
        panic!("blank title must be rejected");
    };
    assert!(matches!(err, TaskError::Validation(_)));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = ready_store().await;
    let id = store
        .create(input("Temp", Priority::Low))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    store.delete(&id).await.unwrap_or_else(|err| panic!("delete: {err}"));
    store.delete(&id).await.unwrap_or_else(|err| panic!("second delete: {err}"));
    assert!(next(&mut store.snapshots()).await.is_empty());
}

#[tokio::test]
async fn malformed_documents_are_skipped() {
    let store = ready_store().await;
    store
        .create(input("Valid", Priority::Low))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    store
        .context()
        .backend()
        .insert_raw(DEFAULT_COLLECTION, "broken", json!({ "title": "x", "priority": 9 }))
        .unwrap_or_else(|err| panic!("insert: {err}"));

    let tasks = next(&mut store.snapshots()).await;
    let titles: Vec<_> = tasks.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, ["Valid"]);
}

#[tokio::test]
async fn writes_fail_fast_until_ready() {
    let ctx = ClientContext::new(LocalBackend::new("demo-key"), RetryPolicy::default());
    let store = TaskStore::new(ctx.clone(), DEFAULT_COLLECTION);
    let Err(err) = store.create(input("Early", Priority::Low)).await else {
        panic!("create before ready must fail");
    };
    assert!(err.is_connection());
    assert!(matches!(
        err,
        TaskError::NotReady {
            state: ConnectionState::Uninitialized
        }
    ));

    ctx.connect().await.unwrap_or_else(|err| panic!("connect: {err}"));
    assert!(store.create(input("Later", Priority::Low)).await.is_ok());
}

#[tokio::test]
async fn backend_outage_surfaces_as_connection_error() {
    let store = ready_store().await;
    store.context().backend().set_online(false);
    let Err(err) = store.create(input("Offline", Priority::Low)).await else {
        panic!("create while offline must fail");
    };
    assert!(err.is_connection(), "{err}");
}

#[tokio::test]
async fn unsubscribe_stops_callbacks_and_releases_listener() {
    let store = ready_store().await;
    let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
    let sink = Arc::clone(&seen);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let subscription = store.subscribe(move |tasks| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(tasks.len());
        }
        let _ = tx.send(());
    });

    rx.recv().await.unwrap_or_else(|| panic!("initial snapshot"));
    store
        .create(input("One", Priority::Low))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    rx.recv().await.unwrap_or_else(|| panic!("delta snapshot"));
    assert!(subscription.is_active());
    assert_eq!(store.context().backend().listener_count(), 1);

    subscription.unsubscribe().await;
    assert_eq!(store.context().backend().listener_count(), 0);
    store
        .create(input("Two", Priority::Low))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    tokio::task::yield_now().await;

    let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
    assert_eq!(seen, [0, 1]);
}

#[tokio::test]
async fn failed_registration_delivers_one_empty_snapshot() {
    let ctx = ClientContext::new(LocalBackend::new(""), RetryPolicy::default());
    let store = TaskStore::new(ctx, DEFAULT_COLLECTION);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let subscription = store.subscribe(move |tasks| {
        let _ = tx.send(tasks.len());
    });
    assert_eq!(rx.recv().await, Some(0));
    assert_eq!(rx.recv().await, None, "callback dropped after the failure");
    subscription.unsubscribe().await;
}

#[tokio::test]
async fn snapshots_end_when_the_context_closes() {
    let store = ready_store().await;
    let mut snapshots = store.snapshots();
    next(&mut snapshots).await;
    store.context().close().await;
    assert!(snapshots.next().await.is_none());
    assert!(snapshots.next().await.is_none());
}

#[tokio::test]
async fn failed_create_leaves_no_task_behind() {
    let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = dir.path().join("demo.json");
    let ctx = ClientContext::new(LocalBackend::persistent("demo-key", &path), RetryPolicy::default());
    ctx.connect().await.unwrap_or_else(|err| panic!("connect: {err}"));
    let store = TaskStore::new(ctx, DEFAULT_COLLECTION);
    let mut snapshots = store.snapshots();
    assert!(next(&mut snapshots).await.is_empty());

    let blocker = path.with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap_or_else(|err| panic!("mkdir: {err}"));
    let Err(err) = store.create(input("Phantom", Priority::Low)).await else {
        panic!("create must fail while the file cannot be written");
    };
    assert!(err.is_connection());

    std::fs::remove_dir(&blocker).unwrap_or_else(|err| panic!("rmdir: {err}"));
    store
        .create(input("Real", Priority::Low))
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    let titles: Vec<_> = next(&mut snapshots).await.into_iter().map(|task| task.title).collect();
    assert_eq!(titles, ["Real"]);
}
