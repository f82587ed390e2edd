//! In-memory connector for tests. Built with `cfg(test)` or the
//! `test-support` feature.
//!
//! Connect outcomes are scripted, links can be dropped on demand to
//! simulate the server going away, and the handle stores the counter row
//! in memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::database::connector::{Closer, Connector, Link, Termination, TerminationSender};
use crate::database::error::{DatabaseError, DatabaseResult};

/// Scriptable [`Connector`] double.
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    delay: Mutex<Duration>,
    failures_remaining: AtomicUsize,
    attempts: AtomicUsize,
    closes: AtomicUsize,
    next_id: AtomicUsize,
    links: Mutex<HashMap<usize, TerminationSender>>,
    storage: Arc<FakeStorage>,
}

/// Rows shared by every client of one connector.
#[derive(Debug, Default)]
pub struct FakeStorage {
    pub(crate) count: Mutex<Option<i32>>,
    pub(crate) queries: AtomicUsize,
    pub(crate) broken: AtomicBool,
}

/// Handle returned by [`FakeConnector`].
#[derive(Debug, Clone)]
pub struct FakeClient {
    pub id: usize,
    pub(crate) storage: Arc<FakeStorage>,
}

impl FakeConnector {
    /// A connector whose attempts always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that fails the first `times` attempts.
    pub fn failing(times: usize) -> Self {
        let fake = Self::new();
        fake.fail_next(times);
        fake
    }

    /// Make every attempt take `delay` before resolving.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
        self
    }

    /// Fail the next `times` attempts.
    pub fn fail_next(&self, times: usize) {
        self.inner.failures_remaining.store(times, Ordering::SeqCst);
    }

    /// Number of connect calls made so far.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Number of close requests received.
    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// End the most recent live link as if the server went away.
    /// Returns false when no link is open.
    pub fn drop_connection(&self, reason: Option<&str>) -> bool {
        let sender = {
            let mut links = self.inner.links.lock().unwrap_or_else(|e| e.into_inner());
            let newest = links.keys().max().copied();
            newest.and_then(|id| links.remove(&id))
        };
        match sender {
            Some(sender) => {
                sender.notify(reason.map(str::to_string));
                true
            }
            None => false,
        }
    }

    /// The stored counter value, if a row exists.
    pub fn stored_count(&self) -> Option<i32> {
        *self.inner.storage.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of statements executed against the storage.
    pub fn queries(&self) -> usize {
        self.inner.storage.queries.load(Ordering::SeqCst)
    }

    /// Make every statement fail until reset.
    pub fn break_queries(&self, broken: bool) {
        self.inner.storage.broken.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Handle = FakeClient;

    async fn connect(&self) -> DatabaseResult<Link<FakeClient>> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.delay.lock().unwrap_or_else(|e| e.into_inner());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .inner
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DatabaseError::Connect("connection refused".to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (notify, termination) = Termination::channel();
        self.inner
            .links
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, notify);

        // Closing ends the link the same way a real driver does.
        let state = Arc::clone(&self.inner);
        let closer = Closer::new(move || {
            state.closes.fetch_add(1, Ordering::SeqCst);
            let sender = state
                .links
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            if let Some(sender) = sender {
                sender.notify(None);
            }
        });

        let client = FakeClient {
            id,
            storage: Arc::clone(&self.inner.storage),
        };
        Ok(Link::new(client, closer, termination))
    }
}

impl FakeClient {
    pub(crate) fn check(&self) -> DatabaseResult<()> {
        self.storage.queries.fetch_add(1, Ordering::SeqCst);
        if self.storage.broken.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failures() {
        let fake = FakeConnector::failing(2);
        assert!(fake.connect().await.is_err());
        assert!(fake.connect().await.is_err());
        assert!(fake.connect().await.is_ok());
        assert_eq!(fake.attempts(), 3);
    }

    #[tokio::test]
    async fn test_drop_connection_fires_termination() {
        let fake = FakeConnector::new();
        let (_client, _closer, termination) = fake.connect().await.unwrap().into_parts();

        assert!(fake.drop_connection(Some("gone")));
        assert_eq!(termination.await.as_deref(), Some("gone"));
        assert!(!fake.drop_connection(None));
    }

    #[tokio::test]
    async fn test_close_ends_link() {
        let fake = FakeConnector::new();
        let (_client, closer, termination) = fake.connect().await.unwrap().into_parts();

        closer.close();
        assert_eq!(termination.await, None);
        assert_eq!(fake.closes(), 1);
        assert!(!fake.drop_connection(None));
    }
}
