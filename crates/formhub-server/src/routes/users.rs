//! Respondent provisioning: `/api/users`

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use formhub_core::accounts::NewRespondent;
use formhub_core::models::UserInfo;
use formhub_core::session::Identity;

use crate::error::{ApiJson, AppError};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_users).post(create_user))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile_number: Option<String>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<UserInfo>>, AppError> {
    Ok(Json(state.accounts.list_respondents(&identity).await?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<Json<UserInfo>, AppError> {
    let user = state
        .accounts
        .provision_respondent(
            &identity,
            NewRespondent {
                name: body.name,
                email: body.email,
                password: body.password,
                mobile_number: body.mobile_number,
            },
        )
        .await?;
    Ok(Json(user))
}
