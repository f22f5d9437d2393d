//! Application layer module
//!
//! Orchestrates one monitoring cycle (snapshot, reconciliation, notification)
//! and the timer that triggers it.

pub mod catalog_monitor;
pub mod reconciliation;
pub mod scheduler;
pub mod snapshot_builder;

pub use catalog_monitor::{CatalogMonitor, CycleError, CycleOutcome, CycleSummary};
pub use reconciliation::{
    Classification, ReconciliationEngine, ReconciliationFailure, ReconciliationReport, classify,
};
pub use scheduler::Scheduler;
pub use snapshot_builder::{CatalogSnapshot, CatalogSnapshotBuilder, SnapshotError};
