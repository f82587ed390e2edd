//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build connection manager → First connect attempt
//!     (failure schedules background retries) → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → HTTP server drains and exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Database unavailability never blocks or aborts startup
//! - The connection manager lives until process exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
