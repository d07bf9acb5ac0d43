//! Parcelsync Storage Library
//!
//! Byte storage for uploaded files. The workflow persists the original bytes
//! through the [`Storage`] trait before any log row is written, and reads
//! them back for integrity checks and diffs.
//!
//! # Storage key format
//!
//! `{YYYYmmddHHMMSS}_{upload_id}_{sanitized filename}`, relative to the
//! backend root. Keys must not contain `..` or a leading `/`. Key generation
//! is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::generate_storage_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use parcelsync_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
