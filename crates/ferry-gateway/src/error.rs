use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ferry_core::DepotError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the HTTP layer, each rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Access denied")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Gone(&'static str),
    #[error("File too large. Try compressing before upload.")]
    PayloadTooLarge,
    #[error("Too many requests. Please slow down.")]
    RateLimited { retry_after: u64 },
    #[error("Service temporarily unavailable. Please try again.")]
    Unavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DepotError> for AppError {
    fn from(value: DepotError) -> Self {
        match value {
            DepotError::EmptyContent => Self::BadRequest("Content cannot be empty!".to_string()),
            DepotError::Storage(err) if err.is_transient() => {
                error!(error = %err, "record store unavailable");
                Self::Unavailable
            }
            err @ DepotError::CodeSpaceExhausted { .. } => {
                error!(error = %err, "could not mint a code");
                Self::Unavailable
            }
            other => {
                error!(error = %other, "depot operation failed");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // internal details stay in the logs
        let message = match &self {
            Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        };

        let mut response = (status, Json(serde_json::json!({ "error": message }))).into_response();

        if let Self::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after.into());
        }

        response
    }
}
