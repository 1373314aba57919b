pub mod actions;
pub mod chats;
pub mod files;
pub mod recommend;

use super::error::ApiError;
use super::state::AppState;
use crate::error::LaimError;
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "x-session-id";

/// Session id of the caller, validated and refreshed
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                LaimError::InvalidRequest(format!("missing {} header", SESSION_HEADER))
            })?
            .to_string();

        let touched = id.clone();
        state
            .store()
            .call(move |s| s.touch_session(&touched))
            .await?;
        Ok(SessionId(id))
    }
}

/// Decode a JSON body, reporting failures as `InvalidRequest`
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| LaimError::InvalidRequest(format!("malformed request body: {}", e)).into())
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/session
pub async fn create_session(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.store().call(|s| s.create_session()).await?;
    tracing::info!("Issued session {}", session.id);
    Ok((StatusCode::CREATED, Json(session)))
}
