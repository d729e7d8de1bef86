use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pix_core::errors::PixError;

/// Any service failure on its way to an HTTP response.
#[derive(Debug)]
pub struct PixAxumError(pub anyhow::Error);

impl From<anyhow::Error> for PixAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<PixError> for PixAxumError {
    fn from(e: PixError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for PixAxumError {
    fn into_response(self) -> Response {
        // A PixError anywhere in the chain (even under anyhow context) keeps its kind.
        let safe = match PixError::from_anyhow(&self.0) {
            Some(pix) => {
                if pix.kind.is_server_error() {
                    tracing::error!(error = ?self.0, "request failed");
                }
                pix.sanitize_for_client()
            }
            None => {
                tracing::error!(error = ?self.0, "unhandled error");
                PixError::normalize(self.0).sanitize_for_client()
            }
        };

        let status =
            StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_json())).into_response()
    }
}
