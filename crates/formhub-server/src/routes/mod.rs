//! HTTP routes.
//!
//! - `/api/auth`: signup and login (unauthenticated)
//! - `/api/forms`: form design and listing
//! - `/api/submissions`: answers and their edit history
//! - `/api/users`: respondent provisioning
//! - `/health`: liveness probe

pub mod auth;
pub mod forms;
pub mod health;
pub mod submissions;
pub mod users;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware as axum_mw;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Signup and login hash passwords; cap how many run at once.
const AUTH_CONCURRENCY_LIMIT: usize = 16;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let authenticated_routes = Router::new()
        .nest("/api/forms", forms::router())
        .nest("/api/submissions", submissions::router())
        .nest("/api/users", users::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let auth_routes = Router::new()
        .nest("/api/auth", auth::router())
        .layer(tower::limit::ConcurrencyLimitLayer::new(AUTH_CONCURRENCY_LIMIT));

    // The browser client is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(auth_routes)
        .merge(authenticated_routes)
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
