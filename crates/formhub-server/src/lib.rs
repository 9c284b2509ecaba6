//! Formhub HTTP server.
//!
//! Wires together the core library, the storage backend, and the HTTP
//! routes into a running Axum server. Serves the JSON API at `/api/*` and
//! a liveness probe at `/health`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::build_router;
