//! Welcome counter service.
//!
//! Serves a page showing how many times it has been visited. The count is
//! kept in PostgreSQL; when the database is unreachable the page still
//! renders with the last known count while the connection is re-established
//! in the background.
//!
//! ```text
//!     GET /  ──▶ http::server ──▶ counter ──▶ ConnectionManager ──▶ PostgreSQL
//!                     │                              │
//!                     ▼                              ▼
//!               views/index.tmpl              retry every second
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use welcome_counter::config::load_config;
use welcome_counter::counter::VisitCounter;
use welcome_counter::http::HttpServer;
use welcome_counter::lifecycle::{startup, Shutdown};
use welcome_counter::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "welcome-counter")]
#[command(about = "Welcome page visit counter", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!("welcome-counter v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        retry_interval_ms = config.database.retry_interval_ms,
        template = %config.http.template_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let manager = startup::build_manager(&config);
    let counter = Arc::new(VisitCounter::new(config.database.bootstrap_schema));
    startup::connect_database(&manager, &counter).await;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config.http, manager, counter);
    let server_shutdown = shutdown.subscribe();
    shutdown.on_os_signal();

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
