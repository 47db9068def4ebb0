//! Maps `AppError` onto HTTP responses with a JSON `{"error": ...}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use vr_core::error::AppError;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(AppError::ValidationError(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            // Store details stay in the logs.
            AppError::Internal(_) => "internal server error".to_string(),
            AppError::Upstream(detail) => detail.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(%status, error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
