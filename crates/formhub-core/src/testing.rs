//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use formhub_storage::{MemoryBackend, StorageBackend, StorageError};
use uuid::Uuid;

use crate::document::DocumentStore;
use crate::models::Role;
use crate::session::Identity;

pub fn docs() -> Arc<DocumentStore> {
    docs_on(Arc::new(MemoryBackend::new()))
}

pub fn docs_on(storage: Arc<dyn StorageBackend>) -> Arc<DocumentStore> {
    Arc::new(DocumentStore::new(storage))
}

pub fn identity(organization_id: Uuid, role: Role) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        organization_id,
        role,
    }
}

pub fn answers(value: serde_json::Value) -> crate::models::Answers {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Memory backend whose `put`s fail for keys under `prefix` while broken.
#[derive(Debug)]
pub struct BrokenWrites {
    inner: MemoryBackend,
    prefix: &'static str,
    broken: AtomicBool,
}

impl BrokenWrites {
    pub fn new(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::new(),
            prefix,
            broken: AtomicBool::new(true),
        })
    }

    pub fn repair(&self) {
        self.broken.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl StorageBackend for BrokenWrites {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.broken.load(Ordering::SeqCst) && key.starts_with(self.prefix) {
            return Err(StorageError::Write {
                key: key.to_owned(),
                reason: "disk full".to_owned(),
            });
        }
        self.inner.put(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, StorageError> {
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix).await
    }
}
