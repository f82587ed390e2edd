//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve the welcome page, health report and static files
//! - Stop on the shutdown broadcast

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::HttpConfig;
use crate::counter::{CounterStore, VisitCounter};
use crate::database::{ConnectionManager, Connector};
use crate::health::get_health;
use crate::http::page::PageTemplate;

/// Application state injected into handlers.
pub struct AppState<C: Connector> {
    pub manager: ConnectionManager<C>,
    pub counter: Arc<VisitCounter>,
    pub page: Arc<PageTemplate>,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            counter: Arc::clone(&self.counter),
            page: Arc::clone(&self.page),
        }
    }
}

/// HTTP server for the welcome page.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new<C>(config: &HttpConfig, manager: ConnectionManager<C>, counter: Arc<VisitCounter>) -> Self
    where
        C: Connector,
        C::Handle: CounterStore,
    {
        let state = AppState {
            manager,
            counter,
            page: Arc::new(PageTemplate::new(&config.template_path)),
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<C>(config: &HttpConfig, state: AppState<C>) -> Router
    where
        C: Connector,
        C::Handle: CounterStore,
    {
        let static_files = ServeDir::new(PathBuf::from(&config.static_dir));

        Router::new()
            .route("/", get(welcome_handler::<C>))
            .route("/health", get(get_health::<C>))
            .fallback_service(static_files)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Count the visit and render the page.
///
/// The database is optional here: without it the last known count is shown.
async fn welcome_handler<C>(State(state): State<AppState<C>>) -> Response
where
    C: Connector,
    C::Handle: CounterStore,
{
    let count = state.counter.visit(&state.manager).await;
    tracing::debug!(count, "Rendering welcome page");

    match state.page.render(count).await {
        Some(html) => ([(header::CONTENT_TYPE, "text/html")], html).into_response(),
        None => ().into_response(),
    }
}
