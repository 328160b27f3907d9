use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::registration::RegistrationError;
use crate::reset::ResetError;

/// Every failure a handler can report. Bodies are shaped as
/// `{ "error": true, "message": .. }`, or `errors: [..]` for validation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentDeclined(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({ "error": true, "errors": errors }),
            Self::Internal(cause) => {
                // Cause stays in the log, never in the response.
                error!("Internal error: {:#}", cause);
                json!({ "error": true, "message": "Internal server error." })
            }
            other => json!({ "error": true, "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::NotFound => Self::NotFound("Campaign Not Found!".into()),
            RegistrationError::AmbiguousRole => Self::BadRequest(err.to_string()),
            RegistrationError::Contention => Self::Internal(anyhow::anyhow!(err)),
            RegistrationError::Store(cause) => Self::Internal(cause),
        }
    }
}

impl From<ResetError> for ApiError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::Store(cause) => Self::Internal(cause),
            ResetError::Hash => Self::Internal(anyhow::anyhow!(err)),
        }
    }
}
