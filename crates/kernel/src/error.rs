//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::content::PublishError;
use crate::content::slug::SlugError;
use crate::session::SessionError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("session error")]
    Session(#[from] SessionError),

    #[error("slug allocation failed")]
    Slug(#[from] SlugError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Slug(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal causes are logged, never sent to the client
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Session(e) => {
                tracing::error!(error = %e, "session error");
                "internal server error".to_string()
            }
            AppError::Slug(e) => {
                tracing::error!(error = %e, "slug allocation failed");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

impl From<PublishError> for AppError {
    fn from(e: PublishError) -> Self {
        match e {
            PublishError::Slug(e) => AppError::Slug(e),
            PublishError::Store(e) => AppError::Internal(e),
            e @ PublishError::Contended => AppError::Internal(e.into()),
        }
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
