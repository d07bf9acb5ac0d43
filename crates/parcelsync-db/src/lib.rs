//! Parcelsync log store
//!
//! Durable state for the review workflow: the three CSV log tables
//! (staging, audit, rollback) that index the current state of every upload,
//! plus the append-only transition journal that records how each record got
//! there.

pub mod db;

pub use db::{
    DirectoryLock, Journal, LogStore, LogTable, ReconcileReport, StoreSnapshot, CANONICAL_HEADER,
};
