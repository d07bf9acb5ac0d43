//! Log store internals
//!
//! `table` reads and writes one CSV table, `journal` appends transition
//! events, `lock` keeps other processes out of the log directory, and
//! `store` ties them together behind a single read/write gate.
//
// Per-table CSV persistence
pub mod table;
//
// Transition event journal
pub mod journal;
//
// Cross-process directory lock
pub mod lock;
//
// Store facade: snapshots, moves, reconcile
pub mod store;

pub use journal::Journal;
pub use lock::DirectoryLock;
pub use store::{LogStore, ReconcileReport, StoreSnapshot};
pub use table::{LogTable, CANONICAL_HEADER};
