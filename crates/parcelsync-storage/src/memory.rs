//! In-memory storage backend.
//!
//! Nothing survives the process; useful for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace stored bytes in place, bypassing the write path.
    pub async fn overwrite(&self, path: &str, data: Vec<u8>) {
        self.files.write().await.insert(path.to_string(), data);
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write(&self, identifier: &str, data: &[u8]) -> StorageResult<String> {
        if identifier.is_empty()
            || identifier.starts_with('/')
            || identifier.split('/').any(|segment| segment == "..")
        {
            return Err(StorageError::InvalidKey(identifier.to_string()));
        }
        self.files
            .write()
            .await
            .insert(identifier.to_string(), data.to_vec());
        Ok(identifier.to_string())
    }

    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.files.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.files.write().await.remove(path);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
