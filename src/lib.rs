//! Welcome page visit counter with a self-healing database connection.

pub mod config;
pub mod counter;
pub mod database;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use database::{ConnectionManager, ConnectionState};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
