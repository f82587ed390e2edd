//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use welcome_counter::config::HttpConfig;
use welcome_counter::counter::VisitCounter;
use welcome_counter::database::{ConnectionManager, FakeConnector};
use welcome_counter::http::HttpServer;
use welcome_counter::lifecycle::Shutdown;

/// A running server backed by a fake database.
#[allow(dead_code)]
pub struct TestApp {
    pub addr: SocketAddr,
    pub fake: FakeConnector,
    pub manager: ConnectionManager<FakeConnector>,
    pub shutdown: Shutdown,
    template: PathBuf,
}

impl TestApp {
    #[allow(dead_code)]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
        let _ = std::fs::remove_file(&self.template);
    }
}

/// Write a template file unique to this test process and name.
pub fn write_template(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "welcome-it-{}-{}.tmpl",
        std::process::id(),
        name
    ));
    std::fs::write(&path, content).unwrap();
    path
}

/// Start a server on an ephemeral port. The manager is left as `setup`
/// leaves it.
#[allow(dead_code)]
pub async fn start_app(name: &str, fake: FakeConnector, retry_period: Duration) -> TestApp {
    let template = write_template(name, "<h1>Visits: @@COUNT@@</h1>");
    let manager = ConnectionManager::with_connector(fake.clone(), retry_period);

    let config = HttpConfig {
        template_path: template.to_string_lossy().into_owned(),
        ..HttpConfig::default()
    };
    let server = HttpServer::new(&config, manager.clone(), Arc::new(VisitCounter::new(true)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestApp {
        addr,
        fake,
        manager,
        shutdown,
        template,
    }
}
