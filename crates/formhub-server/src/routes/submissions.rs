//! Submission routes: `/api/submissions/*`
//!
//! Respondents create submissions and read their own. Admins read every
//! submission of their organization and edit them; each edit archives the
//! previous answers, and `GET /{id}/history` returns the whole timeline.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use formhub_core::models::{Answers, Submission, SubmissionWithUser, TimelineEntry};
use formhub_core::session::Identity;

use crate::error::{ApiJson, ApiPath, AppError};
use crate::state::AppState;

/// Build the `/api/submissions` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_submission))
        .route("/my-submissions", get(my_submissions))
        .route("/user/{user_id}", get(user_submissions))
        .route("/form/{form_id}", get(form_submissions))
        .route("/{id}", get(get_submission).put(edit_submission))
        .route("/{id}/history", get(submission_history))
}

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionRequest {
    pub form_id: Uuid,
    pub form_name: Option<String>,
    #[serde(default)]
    pub data: Answers,
}

#[derive(Debug, Deserialize)]
pub struct EditSubmissionRequest {
    pub data: Answers,
    /// The revision the editor was looking at. Stale revisions are refused.
    pub revision: Option<u64>,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn create_submission(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiJson(body): ApiJson<CreateSubmissionRequest>,
) -> Result<Json<Submission>, AppError> {
    let form = state.forms.get_scoped(&identity, body.form_id).await?;
    let submission = state
        .submissions
        .create(&identity, &form, body.form_name, body.data)
        .await?;
    Ok(Json(submission))
}

async fn my_submissions(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Submission>>, AppError> {
    Ok(Json(state.submissions.list_own(&identity).await?))
}

/// Admin view of one user's submissions.
async fn user_submissions(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<Vec<Submission>>, AppError> {
    Ok(Json(
        state.submissions.list_for_user(&identity, user_id).await?,
    ))
}

async fn form_submissions(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(form_id): ApiPath<Uuid>,
) -> Result<Json<Vec<SubmissionWithUser>>, AppError> {
    let submissions = state.submissions.list_for_form(&identity, form_id).await?;
    Ok(Json(state.accounts.with_submitters(submissions).await?))
}

async fn get_submission(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SubmissionWithUser>, AppError> {
    let submission = state.submissions.get_visible(&identity, id).await?;
    let mut populated = state.accounts.with_submitters(vec![submission]).await?;
    populated
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal(format!("submission {id} lost while populating")))
}

async fn submission_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<TimelineEntry>>, AppError> {
    Ok(Json(state.submissions.timeline(&identity, id).await?))
}

/// Admin-only edit. The old answers move into history.
async fn edit_submission(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<EditSubmissionRequest>,
) -> Result<Json<Submission>, AppError> {
    let submission = state
        .submissions
        .edit(&identity, id, body.data, body.revision)
        .await?;
    Ok(Json(submission))
}
