//! Per-visit read-modify-write with graceful degradation.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::counter::store::CounterStore;
use crate::database::connector::Connector;
use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::manager::ConnectionManager;
use crate::observability::metrics;

/// Counts page visits in the database, remembering the last known value
/// for when the database is unavailable.
#[derive(Debug, Default)]
pub struct VisitCounter {
    last_known: AtomicI32,
    bootstrap_schema: bool,
    schema_ready: AtomicBool,
}

impl VisitCounter {
    /// `bootstrap_schema` creates the table before the first read.
    pub fn new(bootstrap_schema: bool) -> Self {
        Self {
            last_known: AtomicI32::new(0),
            bootstrap_schema,
            schema_ready: AtomicBool::new(false),
        }
    }

    /// The most recent count seen, 0 before any successful visit.
    pub fn last_known(&self) -> i32 {
        self.last_known.load(Ordering::Relaxed)
    }

    /// Record a visit and return the count to display.
    ///
    /// Without a connection, or when a statement fails, returns the last
    /// known count.
    pub async fn visit<C>(&self, manager: &ConnectionManager<C>) -> i32
    where
        C: Connector,
        C::Handle: CounterStore,
    {
        match self.try_visit(manager).await {
            Ok(count) => {
                metrics::record_visit("database");
                count
            }
            Err(DatabaseError::NotConnected) => {
                tracing::debug!("No database connection, showing last known count");
                metrics::record_visit("fallback");
                self.last_known()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to update visit count");
                metrics::record_visit("fallback");
                self.last_known()
            }
        }
    }

    /// Record a visit in the database and return the new count.
    ///
    /// Fails with [`DatabaseError::NotConnected`] without touching storage
    /// when the manager has no connection.
    pub async fn try_visit<C>(&self, manager: &ConnectionManager<C>) -> DatabaseResult<i32>
    where
        C: Connector,
        C::Handle: CounterStore,
    {
        let client = manager.client().ok_or(DatabaseError::NotConnected)?;
        let count = self.increment(client.as_ref()).await?;
        self.last_known.store(count, Ordering::Relaxed);
        Ok(count)
    }

    /// Create the table now if bootstrapping is enabled and it has not
    /// been done yet.
    pub async fn prepare<S: CounterStore + ?Sized>(&self, store: &S) -> DatabaseResult<()> {
        if !self.bootstrap_schema || self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        store.ensure_table().await?;
        self.schema_ready.store(true, Ordering::Release);
        tracing::debug!("Counter table ready");
        Ok(())
    }

    async fn increment<S: CounterStore + ?Sized>(&self, store: &S) -> DatabaseResult<i32> {
        self.prepare(store).await?;

        let count = match store.read_count().await? {
            None => {
                store.insert_count(1).await?;
                1
            }
            Some(current) => {
                let next = current.saturating_add(1);
                store.update_count(next).await?;
                next
            }
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fake::FakeConnector;
    use std::time::Duration;

    const PERIOD: Duration = Duration::from_secs(1);

    async fn connected() -> (FakeConnector, ConnectionManager<FakeConnector>) {
        let fake = FakeConnector::new();
        let manager = ConnectionManager::with_connector(fake.clone(), PERIOD);
        manager.try_connect(false).await.unwrap();
        (fake, manager)
    }

    #[tokio::test]
    async fn test_first_visit_creates_row() {
        let (fake, manager) = connected().await;
        let counter = VisitCounter::new(true);

        assert_eq!(counter.visit(&manager).await, 1);
        assert_eq!(fake.stored_count(), Some(1));

        assert_eq!(counter.visit(&manager).await, 2);
        assert_eq!(counter.visit(&manager).await, 3);
        assert_eq!(fake.stored_count(), Some(3));
        assert_eq!(counter.last_known(), 3);
    }

    #[tokio::test]
    async fn test_schema_bootstrapped_once() {
        let (fake, manager) = connected().await;
        let counter = VisitCounter::new(true);

        counter.visit(&manager).await;
        // ensure_table + read + insert
        assert_eq!(fake.queries(), 3);
        counter.visit(&manager).await;
        // read + update
        assert_eq!(fake.queries(), 5);
    }

    #[tokio::test]
    async fn test_no_client_uses_fallback() {
        let fake = FakeConnector::failing(1);
        let manager = ConnectionManager::with_connector(fake.clone(), PERIOD);
        assert!(manager.try_connect(false).await.is_err());

        let counter = VisitCounter::new(true);
        assert_eq!(counter.visit(&manager).await, 0);
        assert_eq!(fake.queries(), 0);
        assert_eq!(fake.stored_count(), None);
    }

    #[tokio::test]
    async fn test_try_visit_reports_not_connected() {
        let (fake, manager) = connected().await;
        let counter = VisitCounter::new(true);

        assert_eq!(counter.try_visit(&manager).await, Ok(1));
        manager.disconnect();

        let before = fake.queries();
        assert_eq!(
            counter.try_visit(&manager).await,
            Err(DatabaseError::NotConnected)
        );
        assert_eq!(fake.queries(), before);
        assert_eq!(counter.last_known(), 1);
    }

    #[tokio::test]
    async fn test_keeps_last_count_while_disconnected() {
        let (fake, manager) = connected().await;
        let counter = VisitCounter::new(false);

        counter.visit(&manager).await;
        counter.visit(&manager).await;
        manager.disconnect();

        let before = fake.queries();
        assert_eq!(counter.visit(&manager).await, 2);
        assert_eq!(fake.queries(), before);
    }

    #[tokio::test]
    async fn test_query_failure_degrades() {
        let (fake, manager) = connected().await;
        let counter = VisitCounter::new(false);

        assert_eq!(counter.visit(&manager).await, 1);
        fake.break_queries(true);
        assert_eq!(counter.visit(&manager).await, 1);

        fake.break_queries(false);
        assert_eq!(counter.visit(&manager).await, 2);
    }
}
