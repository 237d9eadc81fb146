use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use stream_api::StreamError;

/// Engine error as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub StreamError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StreamError::Validation(_)
            | StreamError::InvalidLocator(_)
            | StreamError::InvalidState(_) => StatusCode::BAD_REQUEST,
            StreamError::UnknownShard { .. } | StreamError::Permanent(_) => StatusCode::NOT_FOUND,
            StreamError::ExpiredIterator(_) => StatusCode::GONE,
            StreamError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            StreamError::Codec(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(e: StreamError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind().to_string(),
            "retry_safe": self.0.is_retry_safe(),
        });
        (status, axum::Json(body)).into_response()
    }
}
