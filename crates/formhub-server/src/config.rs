//! Server configuration for Formhub.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Only the token secret is mandatory.

use std::net::SocketAddr;

use formhub_core::session::DEFAULT_TOKEN_TTL_SECS;

/// Errors while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    /// A variable is set but cannot be used.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Secret used to sign and verify session tokens.
    pub jwt_secret: String,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: i64,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("storage_backend", &self.storage_backend)
            .field("jwt_secret", &"[redacted]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Supported storage backend types.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// PostgreSQL `documents` table.
    Postgres { url: String },
}

impl std::fmt::Debug for StorageBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "Memory"),
            // The URL may carry credentials.
            Self::Postgres { .. } => write!(f, "Postgres"),
        }
    }
}

const DEFAULT_PORT: u16 = 5000;

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, on all interfaces
    /// - `FORMHUB_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:5000`)
    /// - `FORMHUB_STORAGE`: `memory` or `postgres` (default: `memory`)
    /// - `DATABASE_URL`: PostgreSQL connection string (default: `postgres://localhost/formhub`)
    /// - `JWT_SECRET`: token signing secret (required)
    /// - `FORMHUB_TOKEN_TTL_SECS`: token lifetime (default: `86400`)
    /// - `FORMHUB_LOG_LEVEL`: log filter (default: `info`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `JWT_SECRET` is missing or a value does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Priority: FORMHUB_BIND_ADDR > PORT > default 127.0.0.1:5000
        let bind_addr = if let Some(addr) = var("FORMHUB_BIND_ADDR") {
            addr.parse().map_err(|e| ConfigError::Invalid {
                name: "FORMHUB_BIND_ADDR",
                reason: format!("{e}"),
            })?
        } else if let Some(port) = var("PORT") {
            let port: u16 = port.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?;
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let storage_backend = match var("FORMHUB_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageBackendType::Memory,
            "postgres" | "postgresql" => StorageBackendType::Postgres {
                url: var("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/formhub".to_owned()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "FORMHUB_STORAGE",
                    reason: format!("unknown backend '{other}'"),
                });
            }
        };

        let jwt_secret = var("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing { name: "JWT_SECRET" })?;

        let token_ttl_secs = match var("FORMHUB_TOKEN_TTL_SECS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "FORMHUB_TOKEN_TTL_SECS",
                        reason: format!("expected a positive number of seconds, got '{raw}'"),
                    });
                }
            },
            None => DEFAULT_TOKEN_TTL_SECS,
        };

        let log_level = var("FORMHUB_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        Ok(Self {
            bind_addr,
            storage_backend,
            jwt_secret,
            token_ttl_secs,
            log_level,
        })
    }
}
