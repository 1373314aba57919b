use crate::error::{classify, LaimError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Error returned by HTTP handlers
///
/// Renders as `{"error": <kind>, "message": <text>}` with a status derived
/// from the underlying [`LaimError`].
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        classify(&self.0)
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// HTTP status for an error kind
pub fn status_for(err: &LaimError) -> StatusCode {
    match err {
        LaimError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        LaimError::Forbidden(_) => StatusCode::FORBIDDEN,
        LaimError::NotFound(_) => StatusCode::NOT_FOUND,
        LaimError::BackendUnavailable(_) | LaimError::BackendProtocol(_) => {
            StatusCode::BAD_GATEWAY
        }
        LaimError::BackendRejected { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        LaimError::Truncated(_) | LaimError::Http(_) => StatusCode::BAD_GATEWAY,
        LaimError::Serialization(_) => StatusCode::BAD_REQUEST,
        LaimError::Storage(_) | LaimError::Config(_) | LaimError::Io(_) | LaimError::Yaml(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = classify(&self.0).map(LaimError::kind).unwrap_or("internal");

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), kind, "Request failed: {:#}", self.0);
        } else {
            tracing::debug!(status = status.as_u16(), kind, "Request rejected: {:#}", self.0);
        }

        let body = serde_json::json!({
            "error": kind,
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
