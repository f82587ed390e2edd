//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → GET /        → counter visit → page.rs (template fill)
//!     → GET /health  → health report
//!     → anything else → static files
//! ```

pub mod page;
pub mod server;

pub use page::PageTemplate;
pub use server::{AppState, HttpServer};
