/// Document write handlers.
pub mod documents;
/// Family lifecycle handlers.
pub mod families;
/// Health and readiness handlers.
pub mod health;
/// Prometheus metrics exposition handler.
pub mod metrics;
/// Paginated search handler.
pub mod search;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::SwitchyardError;

/// Wrapper that converts `SwitchyardError` into an HTTP response.
pub struct ApiError(pub SwitchyardError);

impl From<SwitchyardError> for ApiError {
    fn from(e: SwitchyardError) -> Self {
        ApiError(e)
    }
}

/// Maps `ApiError` to an HTTP response with a JSON body and appropriate status code.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let status_code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status_code.is_server_error() {
            tracing::error!(error = %self.0, status, "server error");
        } else if status_code.is_client_error() {
            tracing::warn!(error = %self.0, status, "client error");
        }
        let mut body = json!({
            "error": self.0.to_string(),
            "status": status,
        });
        if let SwitchyardError::BulkStoreFailed { failures, .. } = &self.0 {
            body["failures"] = json!(failures);
        }
        (status_code, axum::Json(body)).into_response()
    }
}
