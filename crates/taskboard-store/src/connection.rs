//! Connection gatekeeper shared by every store operation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::DocumentBackend;
use crate::error::TaskError;

/// Lifecycle of the backend session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Nothing attempted yet, or closed.
    #[default]
    Uninitialized,
    /// Attempts are running.
    Initializing,
    /// Mutations and live queries are allowed.
    Ready,
    /// Every attempt failed; only an explicit retry leaves this state.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        })
    }
}

/// Snapshot of the gatekeeper, published on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Failed attempts in the current initialization run.
    pub retry_count: u32,
    /// Message of the most recent failed attempt.
    pub last_error: Option<String>,
    /// Incremented whenever a new run starts or the context is closed.
    pub generation: u64,
}

impl ConnectionStatus {
    /// Returns true when mutations may proceed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// The error a caller sees for this status, if it is not ready.
    #[must_use]
    pub fn error(&self) -> Option<TaskError> {
        match self.state {
            ConnectionState::Ready => None,
            ConnectionState::Failed => Some(TaskError::ConnectionFailed {
                attempts: self.retry_count,
                reason: self.last_error.clone().unwrap_or_default(),
            }),
            state @ (ConnectionState::Uninitialized | ConnectionState::Initializing) => {
                Some(TaskError::NotReady { state })
            }
        }
    }
}

/// Bounded, fixed-delay retry for initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per run, at least one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    /// Default pause between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }
}

/// Owns the backend handle and gates access on readiness.
///
/// Clones share the same backend and state.
pub struct ClientContext<B> {
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    backend: B,
    policy: RetryPolicy,
    status: watch::Sender<ConnectionStatus>,
}

impl<B> Clone for ClientContext<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> fmt::Debug for ClientContext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("policy", &self.inner.policy)
            .field("status", &*self.inner.status.borrow())
            .finish_non_exhaustive()
    }
}

impl<B: DocumentBackend> ClientContext<B> {
    /// Wrap a backend. Nothing is attempted until [`connect`](Self::connect),
    /// [`ensure_ready`](Self::ensure_ready) or [`start`](Self::start).
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                policy,
                status,
            }),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Retry policy in use.
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Watch status transitions.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Current status.
    pub fn current(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Returns true when the state is [`ConnectionState::Ready`].
    pub fn is_ready(&self) -> bool {
        self.inner.status.borrow().is_ready()
    }

    /// Begin initialization on a spawned task if nothing is running.
    ///
    /// Returns whether a new run was started. Must be called within a tokio runtime.
    pub fn start(&self) -> bool {
        self.begin(false)
    }

    /// Start initialization if needed and wait for its outcome.
    ///
    /// Concurrent callers share the in-flight run.
    ///
    /// # Errors
    /// Returns [`TaskError::ConnectionFailed`] once every attempt failed, or
    /// [`TaskError::NotReady`] if the context is closed while waiting.
    pub async fn connect(&self) -> Result<(), TaskError> {
        let mut rx = self.status();
        self.start();
        let status = rx
            .wait_for(|status| status.state != ConnectionState::Initializing)
            .await
            .map(|status| status.clone())
            .map_err(|_| TaskError::NotReady {
                state: ConnectionState::Uninitialized,
            })?;
        status.error().map_or(Ok(()), Err)
    }

    /// Fail fast unless ready. Starts initialization when nothing has run yet.
    ///
    /// # Errors
    /// Returns [`TaskError::NotReady`] or [`TaskError::ConnectionFailed`].
    pub fn ensure_ready(&self) -> Result<(), TaskError> {
        let status = self.current();
        if status.state == ConnectionState::Uninitialized {
            self.start();
        }
        status.error().map_or(Ok(()), Err)
    }

    /// Leave the failed state: reset the retry counter and start a new run.
    ///
    /// Does nothing while a run is in flight or the connection is ready.
    pub fn retry(&self) -> bool {
        self.begin(true)
    }

    /// Disconnect and return to [`ConnectionState::Uninitialized`].
    ///
    /// Attempts still running from before the close are ignored.
    pub async fn close(&self) {
        let closed = self.inner.status.send_if_modified(|status| {
            if status.state == ConnectionState::Uninitialized {
                return false;
            }
            *status = ConnectionStatus {
                generation: status.generation + 1,
                ..ConnectionStatus::default()
            };
            true
        });
        self.inner.backend.disconnect().await;
        if closed {
            info!("backend connection closed");
        }
    }

    fn begin(&self, from_failed: bool) -> bool {
        let mut generation = 0;
        let started = self.inner.status.send_if_modified(|status| {
            let allowed = match status.state {
                ConnectionState::Uninitialized => true,
                ConnectionState::Failed => from_failed,
                ConnectionState::Initializing | ConnectionState::Ready => false,
            };
            if !allowed {
                return false;
            }
            generation = status.generation + 1;
            *status = ConnectionStatus {
                state: ConnectionState::Initializing,
                generation,
                ..ConnectionStatus::default()
            };
            true
        });
        if started {
            info!(generation, "connecting to backend");
            tokio::spawn(Arc::clone(&self.inner).initialize(generation));
        }
        started
    }
}

impl<B: DocumentBackend> Inner<B> {
    async fn initialize(self: Arc<Self>, generation: u64) {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if !self.is_current(generation) {
                return;
            }
            match self.backend.connect().await {
                Ok(()) => {
                    if self.publish(generation, |status| status.state = ConnectionState::Ready) {
                        info!(attempt, "backend connection ready");
                    }
                    return;
                }
                Err(err) => {
                    let last = attempt == max_attempts;
                    warn!(attempt, max_attempts, error = %err, "backend connection attempt failed");
                    let current = self.publish(generation, |status| {
                        status.retry_count = attempt;
                        status.last_error = Some(err.to_string());
                        if last {
                            status.state = ConnectionState::Failed;
                        }
                    });
                    if !current || last {
                        return;
                    }
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let status = self.status.borrow();
        status.generation == generation && status.state == ConnectionState::Initializing
    }

    /// Apply `update` only while `generation` is still the active run.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut ConnectionStatus)) -> bool {
        self.status.send_if_modified(|status| {
            if status.generation != generation || status.state != ConnectionState::Initializing {
                return false;
            }
            update(status);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalBackend;
    use tokio::time::Instant;

    fn context(backend: LocalBackend) -> ClientContext<LocalBackend> {
        ClientContext::new(backend, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_gives_up_after_five_attempts() {
        let backend = LocalBackend::new("demo-key");
        backend.fail_next_connects(100);
        let ctx = context(backend);

        let started = Instant::now();
        let Err(err) = ctx.connect().await else {
            panic!("connect must fail");
        };
        assert!(matches!(err, TaskError::ConnectionFailed { attempts: 5, .. }), "{err}");
        assert_eq!(ctx.backend().connect_attempts(), 5);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(8) && elapsed < Duration::from_secs(9), "{elapsed:?}");

        let status = ctx.current();
        assert_eq!(status.state, ConnectionState::Failed);
        assert_eq!(status.retry_count, 5);
        assert!(status.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_the_attempt_budget() {
        let backend = LocalBackend::new("demo-key");
        backend.fail_next_connects(4);
        let ctx = context(backend);

        ctx.connect().await.unwrap_or_else(|err| panic!("connect: {err}"));
        let status = ctx.current();
        assert!(status.is_ready());
        assert_eq!(status.retry_count, 4);
        assert!(ctx.ensure_ready().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_resets_the_counter_and_starts_over() {
        let backend = LocalBackend::new("demo-key");
        backend.fail_next_connects(5);
        let ctx = context(backend);
        assert!(ctx.connect().await.is_err());

        assert!(ctx.retry());
        let status = ctx.current();
        assert_eq!(status.state, ConnectionState::Initializing);
        assert_eq!(status.retry_count, 0);

        ctx.connect().await.unwrap_or_else(|err| panic!("connect after retry: {err}"));
        assert_eq!(ctx.backend().connect_attempts(), 6);
        assert!(!ctx.retry(), "retry is a no-op once ready");
    }

    #[tokio::test]
    async fn ensure_ready_fails_fast_and_kicks_off_initialization() {
        let ctx = context(LocalBackend::new("demo-key"));
        let Err(err) = ctx.ensure_ready() else {
            panic!("must not be ready before connecting");
        };
        assert!(matches!(
            err,
            TaskError::NotReady {
                state: ConnectionState::Uninitialized
            }
        ));
        assert_eq!(ctx.current().state, ConnectionState::Initializing);

        let mut rx = ctx.status();
        rx.wait_for(ConnectionStatus::is_ready)
            .await
            .unwrap_or_else(|err| panic!("status closed: {err}"));
        assert!(ctx.ensure_ready().is_ok());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let ctx = context(LocalBackend::new("demo-key"));
        let (a, b) = tokio::join!(ctx.connect(), ctx.connect());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(ctx.backend().connect_attempts(), 1);
        assert_eq!(ctx.current().generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_discards_in_flight_attempts() {
        let backend = LocalBackend::new("demo-key");
        backend.fail_next_connects(1);
        let ctx = context(backend);
        assert!(ctx.start());
        let mut rx = ctx.status();
        rx.wait_for(|status| status.retry_count == 1)
            .await
            .unwrap_or_else(|err| panic!("status closed: {err}"));

        ctx.close().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = ctx.current();
        assert_eq!(status.state, ConnectionState::Uninitialized);
        assert_eq!(status.retry_count, 0);
        assert_eq!(ctx.backend().connect_attempts(), 1);
    }
}
