use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::repository::RepoError;

/// AppError
///
/// The single error type returned by services and handlers. Every variant is an
/// expected business outcome except `Internal`, which wraps unexpected failures
/// (database, hashing, signing) and is logged with its context before the
/// client receives a generic message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    /// An idempotent mutation changed nothing (already favorited, not following, ...).
    #[error("{0}")]
    NoEffect(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("could not allocate a unique slug")]
    SlugExhausted,
    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorBody
///
/// Wire shape of every error response: `{"error": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NoEffect(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::SlugExhausted => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convenience for `NotFound` with a formatted message.
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    /// Wraps a repository failure, keeping business outcomes typed and
    /// attaching `context` to anything opaque.
    pub fn from_repo(err: RepoError, context: &str) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound(format!("{context}: not found")),
            RepoError::Conflict => AppError::Conflict(format!("{context}: already exists")),
            RepoError::NoEffect => AppError::NoEffect(format!("{context}: no effect")),
            RepoError::Database(e) => AppError::Internal(format!("{context}: {e}")),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        AppError::from_repo(err, "storage")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(context) => {
                tracing::error!(%context, "request failed with an internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
