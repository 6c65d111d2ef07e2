use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// API-level failures, each mapping to one response status. Every error
/// response shares the `{error, status_code, message, details}` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Permission(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let details = match &self {
            ApiError::Validation { details, .. } => details.clone(),
            ApiError::Internal(cause) => {
                tracing::error!(error = %cause, "unhandled server error");
                // Cause is only echoed back in debug builds.
                if cfg!(debug_assertions) {
                    Some(json!({ "detail": cause.to_string() }))
                } else {
                    None
                }
            }
            _ => None,
        };

        let message = match &self {
            ApiError::Internal(_) if !cfg!(debug_assertions) => {
                "An unexpected error occurred. Please try again later.".to_string()
            }
            other => other.to_string(),
        };

        if status.is_client_error() {
            tracing::warn!(%status, reason = %message, "request rejected");
        }

        let body = json!({
            "error": true,
            "status_code": status.as_u16(),
            "message": message,
            "details": details,
        });
        (status, axum::Json(body)).into_response()
    }
}
