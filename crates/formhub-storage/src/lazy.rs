//! Lazily-connected storage handle.
//!
//! The server owns one [`LazyBackend`] for its whole lifetime. The real
//! backend is established on the first storage call through a single
//! `OnceCell` acquisition point, so concurrent first requests share one
//! connection attempt. A failed attempt leaves the cell empty and the next
//! call tries again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{StorageBackend, StorageError};

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn StorageBackend>, StorageError>> + Send>>;

/// Factory that opens the underlying backend.
pub type Connector = Box<dyn Fn() -> ConnectFuture + Send + Sync>;

/// A [`StorageBackend`] that connects on first use and delegates afterwards.
pub struct LazyBackend {
    connector: Connector,
    inner: OnceCell<Arc<dyn StorageBackend>>,
}

impl std::fmt::Debug for LazyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyBackend")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl LazyBackend {
    /// Wrap a connector. Nothing is opened until the first storage call.
    pub fn new<F, Fut>(connector: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn StorageBackend>, StorageError>> + Send + 'static,
    {
        Self {
            connector: Box::new(move || Box::pin(connector())),
            inner: OnceCell::new(),
        }
    }

    /// Wrap an already-open backend.
    #[must_use]
    pub fn ready(backend: Arc<dyn StorageBackend>) -> Self {
        let shared = Arc::clone(&backend);
        Self {
            connector: Box::new(move || {
                let backend = Arc::clone(&shared);
                Box::pin(async move { Ok(backend) })
            }),
            inner: OnceCell::new_with(Some(backend)),
        }
    }

    /// Whether the underlying backend has been established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.initialized()
    }

    /// Return the underlying backend, connecting first if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] (or whatever the connector returns) if
    /// the connection attempt fails.
    pub async fn backend(&self) -> Result<&Arc<dyn StorageBackend>, StorageError> {
        self.inner
            .get_or_try_init(|| async {
                let backend = (self.connector)().await?;
                tracing::info!("storage backend connected");
                Ok(backend)
            })
            .await
    }
}

#[async_trait::async_trait]
impl StorageBackend for LazyBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.backend().await?.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.backend().await?.put(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, StorageError> {
        self.backend()
            .await?
            .compare_and_swap(key, expected, value)
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.backend().await?.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.backend().await?.list(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.backend().await?.exists(key).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::MemoryBackend;

    fn counting(attempts: Arc<AtomicUsize>, fail_first: bool) -> LazyBackend {
        let memory = MemoryBackend::new();
        LazyBackend::new(move || {
            let attempts = Arc::clone(&attempts);
            let memory = memory.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if fail_first && n == 0 {
                    return Err(StorageError::Open {
                        location: "test".to_owned(),
                        reason: "refused".to_owned(),
                    });
                }
                Ok(Arc::new(memory) as Arc<dyn StorageBackend>)
            }
        })
    }

    #[tokio::test]
    async fn does_not_connect_until_first_use() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let lazy = counting(Arc::clone(&attempts), false);
        assert!(!lazy.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 0);

        lazy.put("k", b"v").await.unwrap();
        assert!(lazy.is_connected());
        assert_eq!(lazy.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_use_connects_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(counting(Arc::clone(&attempts), false));

        let mut handles = Vec::new();
        for i in 0..8 {
            let lazy = Arc::clone(&lazy);
            handles.push(tokio::spawn(async move {
                lazy.put(&format!("k{i}"), b"v").await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.list("k").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn failed_connect_is_retried_on_next_call() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let lazy = counting(Arc::clone(&attempts), true);

        assert!(matches!(lazy.get("k").await, Err(StorageError::Open { .. })));
        assert!(!lazy.is_connected());

        assert_eq!(lazy.get("k").await.unwrap(), None);
        assert!(lazy.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ready_backend_is_connected_immediately() {
        let lazy = LazyBackend::ready(Arc::new(MemoryBackend::new()));
        assert!(lazy.is_connected());
        lazy.put("k", b"v").await.unwrap();
        assert!(lazy.exists("k").await.unwrap());
    }
}
