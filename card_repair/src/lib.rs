#![forbid(unsafe_code)]

//! Card Repair — reconciliation passes for PRS602 access-card tables.
//!
//! Loads the card table through a `CardStore`, runs the repair passes in
//! sequence, reports findings to a `DiagnosticSink` and writes back only
//! the records a pass changed.
//!
//! All card rules live in `card_kernel`; this crate owns the passes,
//! persistence, backups and the command line.

pub mod store;
pub mod sqlite_store;
pub mod sink;
pub mod passes;
pub mod diff;
pub mod proto_types;
pub mod proto_bridge;
pub mod backup;
pub mod config;
pub mod runner;

pub use passes::{run_pass, PassError, PassKind, PassOutcome};
pub use runner::{RepairSession, RunError, RunReport};
pub use sink::{DiagnosticSink, MemorySink, WriterSink};
pub use sqlite_store::SqliteCardStore;
pub use store::{CardStore, MemoryCardStore, PersistenceError};
