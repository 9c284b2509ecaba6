//! Authentication middleware.
//!
//! Every `/api` route except signup and login sits behind
//! [`auth_middleware`]. It verifies the session token and injects the
//! caller's [`Identity`] into request extensions; handlers take it with
//! `Extension<Identity>`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use formhub_core::session::{Identity, bearer_token};

use crate::error::AppError;
use crate::state::AppState;

/// Axum middleware that authenticates API requests.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if the `Authorization` header is
/// missing, or the token is malformed, expired, or signed with another
/// secret. The handler never runs in that case.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity: Identity = {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        state.tokens.verify(token).map_err(|e| {
            warn!(error = ?e, path = %req.uri().path(), "rejected token");
            e
        })?
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
