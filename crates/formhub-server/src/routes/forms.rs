//! Form routes: `/api/forms/*`

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formhub_core::form::{FormDraft, Saved};
use formhub_core::models::{Form, FormItem};
use formhub_core::session::Identity;

use crate::error::{ApiJson, ApiPath, AppError};
use crate::state::AppState;

/// Build the `/api/forms` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_forms))
        .route("/submit", post(save_form))
        .route("/{id}", get(get_form).delete(delete_form))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFormRequest {
    /// Present when updating an existing form.
    pub id: Option<Uuid>,
    #[serde(alias = "name")]
    pub form_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<FormItem>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Admins: every form of the organization. Respondents: forms they have
/// submitted to.
async fn list_forms(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Form>>, AppError> {
    let forms = state
        .forms
        .list_visible(&identity, &state.submissions)
        .await?;
    Ok(Json(forms))
}

async fn get_form(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Form>, AppError> {
    Ok(Json(state.forms.get_scoped(&identity, id).await?))
}

/// Create (201) or update (200) a form.
async fn save_form(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiJson(body): ApiJson<SaveFormRequest>,
) -> Result<(StatusCode, Json<Form>), AppError> {
    let saved = state
        .forms
        .save(
            &identity,
            FormDraft {
                id: body.id,
                name: body.form_name,
                description: body.description,
                items: body.items,
            },
        )
        .await?;

    Ok(match saved {
        Saved::Created(form) => (StatusCode::CREATED, Json(form)),
        Saved::Updated(form) => (StatusCode::OK, Json(form)),
    })
}

/// Delete a form and every submission to it.
async fn delete_form(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .forms
        .delete(&identity, id, &state.submissions)
        .await?;
    Ok(Json(MessageResponse {
        message: "Form and associated submissions deleted".to_owned(),
    }))
}
