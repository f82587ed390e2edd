//! Service health reporting.
//!
//! The service is always "ok" while it can answer; the database state is
//! reported alongside so operators can see a reconnect in progress.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::database::{ConnectionState, Connector};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub version: &'static str,
    pub status: &'static str,
    pub database: ConnectionState,
    pub last_known_count: i32,
}

pub async fn get_health<C>(State(state): State<AppState<C>>) -> Json<HealthReport>
where
    C: Connector,
{
    Json(HealthReport {
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
        database: state.manager.state(),
        last_known_count: state.counter.last_known(),
    })
}
