//! Database connectivity subsystem.
//!
//! # Data Flow
//! ```text
//! DATABASE_URL
//!     → postgres.rs (driver connect, termination notification)
//!     → manager.rs (single connection, retry loop, unexpected-close recovery)
//!     → client() handed to callers (counter, health)
//! ```
//!
//! # Design Decisions
//! - Exactly one physical connection, no pooling
//! - Fixed retry period, no backoff growth
//! - "No connection" is a normal answer, not an error
//! - Graceful degradation when the database is unreachable

pub mod connector;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod manager;
pub mod postgres;

pub use connector::{Closer, Connector, Link, Termination, TerminationSender};
pub use error::{DatabaseError, DatabaseResult};
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeConnector;
pub use manager::{ConnectionManager, ConnectionState};
pub use postgres::PostgresConnector;
