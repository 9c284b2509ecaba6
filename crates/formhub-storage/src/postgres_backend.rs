//! PostgreSQL storage backend.
//!
//! Stores every document in a single `documents` table keyed by the storage
//! path. Values are the serialized documents produced by `formhub-core`.
//!
//! Feature-gated behind `postgres-backend`.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::{StorageBackend, StorageError};

/// A storage backend backed by PostgreSQL.
///
/// Thread-safe via `PgPool`. All operations are fully async.
///
/// # Examples
///
/// ```no_run
/// # use formhub_storage::PostgresBackend;
/// # #[tokio::main]
/// # async fn main() {
/// let backend = PostgresBackend::connect("postgres://localhost/formhub").await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Connect to PostgreSQL and create the `documents` table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the connection or migration fails.
    /// The connection string is never included in the error.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Open {
                location: "postgres".to_owned(),
                reason: e.to_string(),
            })?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (\
                key   TEXT  PRIMARY KEY, \
                value BYTEA NOT NULL\
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Open {
            location: "postgres".to_owned(),
            reason: format!("migration failed: {e}"),
        })?;

        // Prefix scans back every index lookup.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_key_prefix \
             ON documents (key text_pattern_ops)",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Open {
            location: "postgres".to_owned(),
            reason: format!("index creation failed: {e}"),
        })?;

        tracing::info!("postgres document store ready");
        Ok(Self { pool })
    }
}

/// Escape `LIKE` metacharacters so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len().saturating_add(1));
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[async_trait::async_trait]
impl StorageBackend for PostgresBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM documents WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Read {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(row.map(|(v,)| v))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO documents (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, StorageError> {
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO documents (key, value) VALUES ($1, $2) \
                     ON CONFLICT (key) DO NOTHING",
                )
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await
            }
            Some(current) => {
                sqlx::query("UPDATE documents SET value = $3 WHERE key = $1 AND value = $2")
                    .bind(key)
                    .bind(current)
                    .bind(value)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| StorageError::Write {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM documents WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT key FROM documents WHERE key LIKE $1 ORDER BY key")
                .bind(like_prefix(prefix))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::List {
                    prefix: prefix.to_owned(),
                    reason: e.to_string(),
                })?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM documents WHERE key = $1)")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Read {
                    key: key.to_owned(),
                    reason: e.to_string(),
                })?;

        Ok(row.is_some_and(|(e,)| e))
    }
}
