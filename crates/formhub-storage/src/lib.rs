//! Storage backend abstraction for Formhub.
//!
//! This crate defines the [`StorageBackend`] trait, a pure key-value storage
//! interface that knows nothing about organizations, forms, or submissions.
//! The document layer in `formhub-core` serializes records to JSON and maps
//! them onto keys; this layer only sees opaque bytes.
//!
//! Implementations:
//!
//! - [`MemoryBackend`]: in-memory, for development and tests
//! - [`PostgresBackend`]: a single `documents` table (feature `postgres-backend`)
//! - [`LazyBackend`]: wraps a connector and establishes the real backend on
//!   first use, exactly once

mod error;
mod lazy;
mod memory;
#[cfg(feature = "postgres-backend")]
mod postgres_backend;

pub use error::StorageError;
pub use lazy::{Connector, LazyBackend};
pub use memory::MemoryBackend;
#[cfg(feature = "postgres-backend")]
pub use postgres_backend::PostgresBackend;

/// A pluggable key-value storage backend.
///
/// Keys are UTF-8 strings using `/` as a separator (e.g. `forms/<id>`,
/// `org-forms/<org_id>/<form_id>`). Values are opaque byte arrays.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key-value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Atomically replace the value at `key` only if it currently equals
    /// `expected`.
    ///
    /// `expected == None` means "only if the key is absent", which turns this
    /// into an insert-if-absent. Returns `Ok(true)` when the write happened and
    /// `Ok(false)` when the current value did not match.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, StorageError>;

    /// Delete a key. This is idempotent: deleting a non-existent key is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys that start with the given prefix, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Check whether a key exists in storage.
    ///
    /// The default implementation calls [`get`](StorageBackend::get) and checks
    /// for `Some`. Backends may override this with a more efficient check.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}
