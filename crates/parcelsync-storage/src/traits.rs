//! Storage abstraction trait
//!
//! This module defines the Storage trait that all byte storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use parcelsync_core::SyncError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        // A missing stored file is a storage fault, not an unknown upload id.
        SyncError::StorageFailure(err.to_string())
    }
}

/// Storage abstraction trait
///
/// All backends (local filesystem, in-memory) implement this trait so the
/// workflow engine never couples to a specific backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `data` under `identifier` and return the storage path to record.
    ///
    /// The write is all-or-nothing: a failed write leaves nothing readable
    /// under the returned path.
    async fn write(&self, identifier: &str, data: &[u8]) -> StorageResult<String>;

    /// Read back the bytes stored at `path`
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Check if a file exists
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Delete a file. Deleting a missing file succeeds.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
