use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::repository::RepoError;

/// AppError
///
/// Handler-facing failure taxonomy. `NotFound` and `Forbidden` are surfaced verbatim to the
/// client; store failures are logged and reported as a generic internal error.
///
/// Soft redirects are routing decisions, not errors, and never pass through this type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A referenced record is absent, or exists but fails a published-state precondition.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The authorization guard refused a mutation.
    #[error("Forbidden")]
    Forbidden,

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A unique value is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An external collaborator (identity provider, object storage) failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The Entity Store failed.
    #[error(transparent)]
    Repo(RepoError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict(msg) => AppError::Conflict(msg),
            RepoError::Constraint(msg) => AppError::Validation(msg),
            other => AppError::Repo(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You are not allowed to modify this resource".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream service error");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "An upstream service failed".to_string(),
                )
            }
            AppError::Repo(err) => {
                tracing::error!(error = %err, "Repository error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
