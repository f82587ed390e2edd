//! Startup orchestration.
//!
//! # Design Decisions
//! - Config and bind errors are fatal
//! - A missing or unreachable database is not: the page degrades and the
//!   manager keeps retrying in the background

use crate::config::AppConfig;
use crate::counter::{CounterStore, VisitCounter};
use crate::database::{ConnectionManager, Connector, PostgresConnector};

/// Build the manager from config. Left unconfigured without a URL.
pub fn build_manager(config: &AppConfig) -> ConnectionManager<PostgresConnector> {
    let manager = ConnectionManager::new(config.database.retry_interval());
    match PostgresConnector::from_config(&config.database) {
        Some(connector) => manager.configure(connector),
        None => tracing::warn!("DATABASE_URL not set; visit counting disabled"),
    }
    manager
}

/// First connect attempt. Failure is logged and retried in the background;
/// on success the counter table is prepared.
pub async fn connect_database<C>(manager: &ConnectionManager<C>, counter: &VisitCounter)
where
    C: Connector,
    C::Handle: CounterStore,
{
    if let Err(e) = manager.try_connect(true).await {
        tracing::error!(
            error = %e,
            retry_ms = manager.retry_period().as_millis() as u64,
            "Initial database connect failed, retrying in background"
        );
        return;
    }

    if let Some(client) = manager.client() {
        if let Err(e) = counter.prepare(client.as_ref()).await {
            tracing::warn!(error = %e, "Failed to prepare counter table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ConnectionState, FakeConnector};
    use std::time::Duration;

    #[tokio::test]
    async fn test_build_manager_without_url() {
        let manager = build_manager(&AppConfig::default());
        assert!(!manager.is_configured());
        assert_eq!(manager.retry_period(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_build_manager_with_url() {
        let mut config = AppConfig::default();
        config.database.url = Some("postgres://localhost/app".into());
        config.database.retry_interval_ms = 250;

        let manager = build_manager(&config);
        assert!(manager.is_configured());
        assert_eq!(manager.retry_period(), Duration::from_millis(250));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_database_prepares_table() {
        let fake = FakeConnector::new();
        let manager = ConnectionManager::with_connector(fake.clone(), Duration::from_secs(1));
        let counter = VisitCounter::new(true);

        connect_database(&manager, &counter).await;
        assert!(manager.is_connected());
        assert_eq!(fake.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_database_failure_schedules_retry() {
        let fake = FakeConnector::failing(1);
        let manager = ConnectionManager::with_connector(fake.clone(), Duration::from_secs(1));
        let counter = VisitCounter::new(true);

        connect_database(&manager, &counter).await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);

        tokio::time::sleep(Duration::from_millis(1010)).await;
        assert!(manager.is_connected());
        assert_eq!(fake.attempts(), 2);
    }
}
