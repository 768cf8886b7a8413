use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use strand_core::StrandError;

/// Error wrapper for wallet handlers: `{success: false, error}` with the
/// canonical status for the taxonomy entry (the mapping lives in strand-core).
#[derive(Debug)]
pub struct ApiError(pub StrandError);

impl From<StrandError> for ApiError {
    fn from(e: StrandError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "wallet request failed");
        }
        let body = json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, axum::Json(body)).into_response()
    }
}
