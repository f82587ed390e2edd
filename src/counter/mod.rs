//! Visit counter.
//!
//! # Data Flow
//! ```text
//! GET /
//!     → visit.rs (ask manager for a client)
//!         → client present: store.rs read → insert/update → new count
//!         → client absent: last known count, storage untouched
//!     → rendered into the page
//! ```
//!
//! # Known Hazard
//! The read and the write are separate statements. Two overlapping visits
//! can read the same value and both write the same increment.

pub mod store;
pub mod visit;

pub use store::CounterStore;
pub use visit::VisitCounter;
