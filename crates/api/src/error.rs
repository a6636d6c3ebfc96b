//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::ContractError;

/// Error wrapper for converting broker errors to HTTP responses.
///
/// Body: `{ "status": "error", "message": "..." }`
#[derive(Debug)]
pub struct ApiError(pub ContractError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ContractError::NotFound { .. } => StatusCode::NOT_FOUND,
            ContractError::Validation { .. } => StatusCode::BAD_REQUEST,
            ContractError::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ContractError::Storage { .. }
            | ContractError::ConfigParse { .. }
            | ContractError::ConfigValidation { .. }
            | ContractError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }

        let body = serde_json::json!({
            "status": "error",
            "message": self.0.to_string()
        });

        (status, Json(body)).into_response()
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        ApiError(err)
    }
}
