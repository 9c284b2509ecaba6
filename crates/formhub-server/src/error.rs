//! HTTP error types for the Formhub server.
//!
//! Maps domain errors from `formhub-core` into HTTP responses. Every error
//! variant produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`. Internal failures are logged here and reach
//! the client only as a generic message.

use axum::extract::{FromRequest, FromRequestParts};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use formhub_core::error::{
    AuthError, DocumentError, FormError, OrgError, SubmissionError, UserError,
};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed, expired, or forged token.
    Unauthorized(String),
    /// The caller's role or organization does not allow the operation.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// The edit was based on an outdated version.
    Conflict(String),
    /// Internal server error. The detail is logged, never returned.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `axum::Json` whose rejections render as [`AppError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `axum::extract::Path` whose rejections render as [`AppError::BadRequest`],
/// so a malformed id gets the same JSON body as every other error.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::Expired | AuthError::InvalidToken { .. } => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::Signing { .. } | AuthError::PasswordHash { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<OrgError> for AppError {
    fn from(err: OrgError) -> Self {
        match err {
            OrgError::NameTaken | OrgError::Invalid { .. } => Self::BadRequest(err.to_string()),
            OrgError::NotFound => Self::NotFound(err.to_string()),
            OrgError::Document(inner) => inner.into(),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken | UserError::InvalidCredentials | UserError::Invalid { .. } => {
                Self::BadRequest(err.to_string())
            }
            UserError::NotFound => Self::NotFound(err.to_string()),
            UserError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            UserError::Org(inner) => inner.into(),
            UserError::Auth(inner) => inner.into(),
            UserError::Document(inner) => inner.into(),
        }
    }
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::NotFound { .. } => Self::NotFound(err.to_string()),
            FormError::WrongOrganization | FormError::Forbidden { .. } => {
                Self::Forbidden(err.to_string())
            }
            FormError::Invalid { .. } => Self::BadRequest(err.to_string()),
            FormError::Submission(inner) => inner.into(),
            FormError::Document(inner) => inner.into(),
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::NotFound => Self::NotFound(err.to_string()),
            SubmissionError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            SubmissionError::RevisionMismatch { .. } | SubmissionError::ConcurrentEdit => {
                Self::Conflict(err.to_string())
            }
            SubmissionError::Document(inner) => inner.into(),
        }
    }
}
