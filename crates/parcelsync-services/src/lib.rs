//! Parcelsync Services Layer
//!
//! This crate is the **workflow layer**: it hosts the staging, approval and
//! rollback engine, the diff generator and the export surface, and re-exports
//! the store and storage types so that the CLI depends on a single facade.
//! Keep orchestration here; keep argument parsing and output in the CLI.

pub mod services;
pub mod setup;

pub use parcelsync_db::{LogStore, ReconcileReport, StoreSnapshot};
pub use parcelsync_storage::{
    create_storage, LocalStorage, MemoryStorage, Storage, StorageBackend, StorageError,
    StorageResult,
};
pub use services::{
    compare, ensure, DiffGenerator, LogExporter, StaticRoles, StaticSystemOfRecord, SyncWorkflow,
    WorkflowOptions, EXPORT_HEADER,
};
pub use setup::initialize;
