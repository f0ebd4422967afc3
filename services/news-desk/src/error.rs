//! HTTP-facing error type
//!
//! Every handler returns `Result<_, AppError>`. The response body is
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

/// Message returned when no key can serve the request right now.
pub const UNAVAILABLE_MESSAGE: &str = "service temporarily unavailable, try again later";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    /// Key pool exhausted or retry budget spent
    #[error("service temporarily unavailable, try again later")]
    Unavailable,

    /// Terminal failure from the generation backend
    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::BadRequest(_) => "invalid_request",
            AppError::Unavailable => "unavailable",
            AppError::Backend(_) => "generation_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<key_pool::Error> for AppError {
    fn from(err: key_pool::Error) -> Self {
        if err.is_exhaustion() {
            warn!(error = %err, "generation unavailable");
            crate::metrics::record_generation_failure("exhausted");
            return AppError::Unavailable;
        }
        match err {
            key_pool::Error::Backend(e) => {
                error!(error = %e, "generation backend error");
                crate::metrics::record_generation_failure("backend");
                AppError::Backend(e.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<news_store::Error> for AppError {
    fn from(err: news_store::Error) -> Self {
        match err {
            news_store::Error::InvalidId(id) => AppError::BadRequest(format!("invalid id: {id}")),
            other => {
                error!(error = %other, "news store error");
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "request_id": request_id,
            }
        });
        (
            self.status(),
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
