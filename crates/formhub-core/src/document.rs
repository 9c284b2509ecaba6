//! JSON document layer over the storage backend.
//!
//! Every record is a JSON document stored under `<collection>/<id>`.
//! Secondary lookups use index keys whose last path segment is the target
//! record id (`org-forms/<org_id>/<form_id>`), so a prefix scan yields the
//! ids directly. Uniqueness keys (`user-emails/<email>`) store the owning id
//! as their value and are claimed with an atomic insert-if-absent.

use std::sync::Arc;

use formhub_storage::StorageBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DocumentError;

/// A document loaded together with the exact bytes it was read from.
///
/// Passing `raw` back to [`DocumentStore::replace`] makes the write
/// conditional on nobody else having written in between.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub doc: T,
    pub raw: Vec<u8>,
}

/// Typed JSON access to the storage backend.
pub struct DocumentStore {
    storage: Arc<dyn StorageBackend>,
}

impl DocumentStore {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Load and decode a document.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Storage`] if the backend fails.
    /// - [`DocumentError::Decode`] if the stored bytes are not a valid `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DocumentError> {
        Ok(self.get_versioned(key).await?.map(|v| v.doc))
    }

    /// Load a document and keep its raw bytes for a later conditional write.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn get_versioned<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<Versioned<T>>, DocumentError> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };
        let doc = serde_json::from_slice(&raw).map_err(|e| DocumentError::Decode {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Some(Versioned { doc, raw }))
    }

    /// Write a document unconditionally.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Encode`] if `doc` cannot be serialized.
    /// - [`DocumentError::Storage`] if the backend fails.
    pub async fn put<T: Serialize>(&self, key: &str, doc: &T) -> Result<(), DocumentError> {
        let bytes = encode(key, doc)?;
        self.storage.put(key, &bytes).await?;
        Ok(())
    }

    /// Write a document only if `key` currently holds exactly `expected`.
    ///
    /// Returns `false` when another writer got there first.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    pub async fn replace<T: Serialize>(
        &self,
        key: &str,
        expected: &[u8],
        doc: &T,
    ) -> Result<bool, DocumentError> {
        let bytes = encode(key, doc)?;
        Ok(self
            .storage
            .compare_and_swap(key, Some(expected), &bytes)
            .await?)
    }

    /// Claim a uniqueness key for `owner`. Returns `false` if already claimed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Storage`] if the backend fails.
    pub async fn claim(&self, key: &str, owner: Uuid) -> Result<bool, DocumentError> {
        Ok(self
            .storage
            .compare_and_swap(key, None, owner.to_string().as_bytes())
            .await?)
    }

    /// Read the owner recorded under a uniqueness key.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Storage`] if the backend fails.
    /// - [`DocumentError::CorruptIndex`] if the value is not a UUID.
    pub async fn claimed_by(&self, key: &str) -> Result<Option<Uuid>, DocumentError> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Some)
            .ok_or_else(|| DocumentError::CorruptIndex {
                key: key.to_owned(),
            })
    }

    /// Add an index entry. The id is the last segment of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Storage`] if the backend fails.
    pub async fn index(&self, key: &str) -> Result<(), DocumentError> {
        self.storage.put(key, b"").await?;
        Ok(())
    }

    /// Collect the record ids indexed under `prefix`, in key order.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Storage`] if the backend fails.
    /// - [`DocumentError::CorruptIndex`] if a key does not end in a UUID.
    pub async fn indexed_ids(&self, prefix: &str) -> Result<Vec<Uuid>, DocumentError> {
        let keys = self.storage.list(prefix).await?;
        keys.into_iter()
            .map(|key| {
                key.strip_prefix(prefix)
                    .and_then(|id| Uuid::parse_str(id).ok())
                    .ok_or(DocumentError::CorruptIndex { key })
            })
            .collect()
    }

    /// Delete a document or index key. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Storage`] if the backend fails.
    pub async fn delete(&self, key: &str) -> Result<(), DocumentError> {
        self.storage.delete(key).await?;
        Ok(())
    }

    /// Check whether a key exists.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Storage`] if the backend fails.
    pub async fn exists(&self, key: &str) -> Result<bool, DocumentError> {
        Ok(self.storage.exists(key).await?)
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

fn encode<T: Serialize>(key: &str, doc: &T) -> Result<Vec<u8>, DocumentError> {
    serde_json::to_vec(doc).map_err(|e| DocumentError::Encode {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

/// Normalize a free-text value for use as a uniqueness key segment.
///
/// Trims, lowercases, and percent-encodes so `/` in user input cannot
/// escape its key prefix.
#[must_use]
pub fn key_segment(value: &str) -> String {
    urlencoding::encode(&value.trim().to_lowercase()).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use formhub_storage::MemoryBackend;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        n: u32,
    }

    fn store() -> (DocumentStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (
            DocumentStore::new(Arc::clone(&backend) as Arc<dyn StorageBackend>),
            backend,
        )
    }

    #[tokio::test]
    async fn put_then_get_decodes() {
        let (docs, _) = store();
        docs.put("things/1", &Doc { n: 7 }).await.unwrap();
        assert_eq!(docs.get::<Doc>("things/1").await.unwrap(), Some(Doc { n: 7 }));
        assert_eq!(docs.get::<Doc>("things/2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn undecodable_document_is_reported() {
        let (docs, backend) = store();
        backend.put("things/1", b"not json").await.unwrap();
        assert!(matches!(
            docs.get::<Doc>("things/1").await,
            Err(DocumentError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn replace_fails_after_intervening_write() {
        let (docs, _) = store();
        docs.put("things/1", &Doc { n: 1 }).await.unwrap();
        let first = docs.get_versioned::<Doc>("things/1").await.unwrap().unwrap();

        docs.put("things/1", &Doc { n: 2 }).await.unwrap();

        assert!(!docs.replace("things/1", &first.raw, &Doc { n: 3 }).await.unwrap());
        assert_eq!(docs.get::<Doc>("things/1").await.unwrap(), Some(Doc { n: 2 }));
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let (docs, _) = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(docs.claim("names/acme", a).await.unwrap());
        assert!(!docs.claim("names/acme", b).await.unwrap());
        assert_eq!(docs.claimed_by("names/acme").await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn indexed_ids_strip_prefix() {
        let (docs, _) = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        docs.index(&format!("idx/x/{a}")).await.unwrap();
        docs.index(&format!("idx/x/{b}")).await.unwrap();
        docs.index(&format!("idx/y/{}", Uuid::new_v4())).await.unwrap();

        let mut ids = docs.indexed_ids("idx/x/").await.unwrap();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn corrupt_index_key_is_reported() {
        let (docs, _) = store();
        docs.index("idx/x/not-a-uuid").await.unwrap();
        assert!(matches!(
            docs.indexed_ids("idx/x/").await,
            Err(DocumentError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn key_segment_normalizes_and_escapes() {
        assert_eq!(key_segment("  Bob@X.com "), "bob%40x.com");
        assert_eq!(key_segment("Acme/Corp"), "acme%2Fcorp");
    }
}
