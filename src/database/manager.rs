//! Connection lifecycle manager.
//!
//! Owns at most one live connection and at most one retry timer, never both.
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting: try_connect
//! Reconnecting → Connecting: retry tick (timer kept while attempting)
//! Connecting → Connected: attempt succeeded, retry timer cancelled
//! Connecting → Reconnecting: attempt failed with a timer running, or
//!                            reconnect requested by the caller
//! Connecting → Disconnected: attempt failed, no reconnect requested
//! Connected → Disconnected: explicit disconnect
//! Connected → Reconnecting: connection ended unexpectedly
//! ```
//!
//! State lives behind a mutex that is only held for short synchronous
//! transitions, never across an await.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::database::connector::{Closer, Connector, Link, Termination};
use crate::database::error::{DatabaseError, DatabaseResult};
use crate::observability::metrics;

/// Observable snapshot of the manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum State<H> {
    Disconnected,
    Connecting { retry: Option<RetryTimer> },
    Connected(Live<H>),
    Reconnecting(RetryTimer),
}

impl<H> State<H> {
    fn snapshot(&self) -> ConnectionState {
        match self {
            State::Disconnected => ConnectionState::Disconnected,
            State::Connecting { .. } => ConnectionState::Connecting,
            State::Connected(_) => ConnectionState::Connected,
            State::Reconnecting(_) => ConnectionState::Reconnecting,
        }
    }
}

/// An established connection.
struct Live<H> {
    id: u64,
    client: Arc<H>,
    closer: Closer,
    watcher: JoinHandle<()>,
}

impl<H> Live<H> {
    /// Stop watching for termination, then close.
    fn close(self) {
        self.watcher.abort();
        self.closer.close();
    }
}

/// Repeating reconnect task. Dropping it cancels the task.
struct RetryTimer {
    task: JoinHandle<()>,
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Manages the lifecycle of one database connection.
///
/// Cheap to clone; clones share the same state.
pub struct ConnectionManager<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C: Connector> {
    connector: RwLock<Option<Arc<C>>>,
    state: Mutex<State<C::Handle>>,
    retry_period: Duration,
    next_link_id: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create an unconfigured manager. Connect calls are no-ops until
    /// [`configure`](Self::configure) supplies a connector.
    pub fn new(retry_period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector: RwLock::new(None),
                state: Mutex::new(State::Disconnected),
                retry_period,
                next_link_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a manager with a connector already configured.
    pub fn with_connector(connector: C, retry_period: Duration) -> Self {
        let manager = Self::new(retry_period);
        manager.configure(connector);
        manager
    }

    /// Install the connector. Takes effect on the next connect attempt.
    pub fn configure(&self, connector: C) {
        let mut slot = self
            .inner
            .connector
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(connector));
    }

    pub fn is_configured(&self) -> bool {
        self.inner.connector().is_some()
    }

    pub fn retry_period(&self) -> Duration {
        self.inner.retry_period
    }

    /// Try to establish the connection.
    ///
    /// Does nothing when already connected, when an attempt is already in
    /// flight, or when no connector is configured. On failure no partial
    /// connection is kept, the retry loop is started if
    /// `reconnect_on_failure` is set, and the error is returned.
    ///
    /// Once started, the attempt runs to completion even if this future is
    /// dropped.
    pub async fn try_connect(&self, reconnect_on_failure: bool) -> DatabaseResult<()> {
        let Some(connector) = self.inner.begin_attempt() else {
            return Ok(());
        };

        let inner = Arc::clone(&self.inner);
        let attempt = tokio::spawn(async move {
            let result = connector.connect().await;
            inner.complete(result, reconnect_on_failure)
        });

        match attempt.await {
            Ok(result) => result,
            Err(e) => {
                // The connector panicked; leave the state as if it had failed.
                let err = DatabaseError::Connect(format!("connect task failed: {}", e));
                let _ = self.inner.complete(Err(err.clone()), reconnect_on_failure);
                Err(err)
            }
        }
    }

    /// Start the retry loop unless it is already running.
    ///
    /// No effect while connected.
    pub fn reconnect(&self) {
        let mut state = self.inner.lock_state();
        self.inner.start_retry(&mut state);
    }

    /// Close the current connection, if any. Never starts a retry.
    pub fn disconnect(&self) {
        let live = {
            let mut state = self.inner.lock_state();
            if !matches!(*state, State::Connected(_)) {
                return;
            }
            match mem::replace(&mut *state, State::Disconnected) {
                State::Connected(live) => live,
                _ => return,
            }
        };

        tracing::info!(link = live.id, "Closing database connection");
        live.close();
        metrics::record_connected(false);
    }

    /// The usable client, or `None` when there is no connection.
    pub fn client(&self) -> Option<Arc<C::Handle>> {
        match &*self.inner.lock_state() {
            State::Connected(live) => Some(Arc::clone(&live.client)),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.lock_state(), State::Connected(_))
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_state().snapshot()
    }

    /// Whether the retry timer is currently running.
    pub fn retry_active(&self) -> bool {
        matches!(
            *self.inner.lock_state(),
            State::Reconnecting(_) | State::Connecting { retry: Some(_) }
        )
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("configured", &self.is_configured())
            .field("retry_period", &self.inner.retry_period)
            .finish()
    }
}

impl<C: Connector> Inner<C> {
    fn lock_state(&self) -> MutexGuard<'_, State<C::Handle>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn connector(&self) -> Option<Arc<C>> {
        self.connector
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Move into `Connecting` and hand out the connector, or `None` when
    /// the attempt must not start.
    fn begin_attempt(&self) -> Option<Arc<C>> {
        let connector = self.connector()?;

        let mut state = self.lock_state();
        let retry = match mem::replace(&mut *state, State::Disconnected) {
            State::Disconnected => None,
            State::Reconnecting(timer) => Some(timer),
            busy @ (State::Connected(_) | State::Connecting { .. }) => {
                *state = busy;
                return None;
            }
        };
        *state = State::Connecting { retry };
        drop(state);

        tracing::debug!("Connecting to database");
        Some(connector)
    }

    /// Apply the outcome of an attempt started by `begin_attempt`.
    fn complete(
        self: &Arc<Self>,
        result: DatabaseResult<Link<C::Handle>>,
        reconnect_on_failure: bool,
    ) -> DatabaseResult<()> {
        let mut state = self.lock_state();
        let retry = match mem::replace(&mut *state, State::Disconnected) {
            State::Connecting { retry } => retry,
            other => {
                // Only the attempt itself leaves Connecting.
                *state = other;
                if let Ok(link) = result {
                    let (_, closer, _) = link.into_parts();
                    closer.close();
                }
                return Ok(());
            }
        };

        match result {
            Ok(link) => {
                let id = self.next_link_id.fetch_add(1, Ordering::Relaxed);
                let (handle, closer, termination) = link.into_parts();
                // Spawned under the lock so an immediate termination still
                // finds this link installed.
                let watcher = self.watch(id, termination);
                *state = State::Connected(Live {
                    id,
                    client: Arc::new(handle),
                    closer,
                    watcher,
                });
                drop(state);

                let resumed = retry.is_some();
                drop(retry);

                metrics::record_connect_attempt("success");
                metrics::record_connected(true);
                tracing::info!(link = id, resumed, "Connected to database");
                Ok(())
            }
            Err(e) => {
                match retry {
                    Some(timer) => *state = State::Reconnecting(timer),
                    None if reconnect_on_failure => self.start_retry(&mut state),
                    None => {}
                }
                drop(state);

                metrics::record_connect_attempt("failure");
                Err(e)
            }
        }
    }

    /// Start the retry timer on the locked state if none is running.
    fn start_retry(self: &Arc<Self>, state: &mut State<C::Handle>) {
        if matches!(state, State::Disconnected) {
            *state = State::Reconnecting(self.spawn_retry());
            tracing::info!(
                period_ms = self.retry_period.as_millis() as u64,
                "Scheduling database reconnect"
            );
        } else if let State::Connecting { retry } = state {
            if retry.is_none() {
                *retry = Some(self.spawn_retry());
            }
        }
    }

    fn spawn_retry(self: &Arc<Self>) -> RetryTimer {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.retry_period;

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let manager = ConnectionManager { inner };
                if let Err(e) = manager.try_connect(false).await {
                    tracing::warn!(error = %e, "Database reconnect attempt failed");
                }
            }
        });

        RetryTimer { task }
    }

    fn watch(self: &Arc<Self>, id: u64, termination: Termination) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let reason = termination.await;
            if let Some(inner) = weak.upgrade() {
                inner.on_terminated(id, reason);
            }
        })
    }

    /// The connection ended without an explicit disconnect.
    fn on_terminated(self: &Arc<Self>, id: u64, reason: Option<String>) {
        let mut state = self.lock_state();
        let current = matches!(&*state, State::Connected(live) if live.id == id);
        if !current {
            tracing::debug!(link = id, "Ignoring termination of stale connection");
            return;
        }
        let State::Connected(live) = mem::replace(&mut *state, State::Disconnected) else {
            return;
        };
        self.start_retry(&mut state);
        drop(state);

        tracing::warn!(
            link = id,
            reason = reason.as_deref().unwrap_or("connection closed"),
            "Database connection ended unexpectedly"
        );
        live.closer.close();
        metrics::record_unexpected_disconnect();
        metrics::record_connected(false);
    }
}
