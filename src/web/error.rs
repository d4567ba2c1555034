use crate::adapters::whatsapp::UNREGISTERED_TEST_NUMBER;
use crate::utils::error::{ErrorCategory, ReferralError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Recipient is not on the messaging provider's test list.
    #[error("{0}")]
    TestNumber(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::TestNumber(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ReferralError> for ApiError {
    fn from(err: ReferralError) -> Self {
        match &err {
            ReferralError::MessagingError {
                message,
                code: Some(UNREGISTERED_TEST_NUMBER),
            } => return ApiError::TestNumber(message.clone()),
            ReferralError::ConflictError { .. } => {
                return ApiError::Conflict(err.user_friendly_message())
            }
            _ => {}
        }

        match err.category() {
            ErrorCategory::Validation => ApiError::BadRequest(err.user_friendly_message()),
            ErrorCategory::Authentication => ApiError::Unauthorized(err.user_friendly_message()),
            ErrorCategory::NotFound => ApiError::NotFound(err.user_friendly_message()),
            _ => {
                // 細節只寫入日誌
                tracing::error!(
                    "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                    err,
                    err.category(),
                    err.severity()
                );
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::TestNumber(message) => json!({ "error": message, "isTestError": true }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
