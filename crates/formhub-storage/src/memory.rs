//! In-memory storage backend.
//!
//! Stores all data in a `BTreeMap` behind a `RwLock`. Nothing is persisted;
//! everything is lost when the process exits. Used for local development
//! (`FORMHUB_STORAGE=memory`) and by every test in the workspace.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// Cloning shares the underlying map. Data is sorted by key, which makes
/// prefix listing a range scan.
///
/// # Examples
///
/// ```
/// # use formhub_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("forms/1", b"{}").await.unwrap();
/// let val = backend.get("forms/1").await.unwrap();
/// assert_eq!(val, Some(b"{}".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(key.to_owned(), value.to_vec());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let keys = data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }
}
