//! Account routes: `/api/auth/*`
//!
//! Signup creates an organization with its first admin; login exchanges
//! credentials for a session token. Neither requires a token.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use formhub_core::accounts::{Session, Signup};

use crate::error::{ApiJson, AppError};
use crate::state::AppState;

/// Build the `/api/auth` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

// ── Request types ────────────────────────────────────────────────────

/// Missing fields deserialize as empty and are rejected by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub organization_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let session = state
        .accounts
        .signup(Signup {
            name: body.name,
            email: body.email,
            password: body.password,
            organization_name: body.organization_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state.accounts.login(&body.email, &body.password).await?;
    Ok(Json(session))
}
