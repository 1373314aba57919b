use super::SessionId;
use crate::error::LaimError;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

/// Header naming an uploaded file
pub const FILENAME_HEADER: &str = "x-filename";

const DEFAULT_MIME: &str = "application/octet-stream";
const DEFAULT_FILENAME: &str = "upload";

fn header_or<'a>(headers: &'a HeaderMap, name: &str, default: &'a str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

/// POST /api/files
///
/// The body size cap is enforced by the route's `DefaultBodyLimit`.
pub async fn upload(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(LaimError::InvalidRequest("uploaded file is empty".into()).into());
    }

    let mime = header_or(&headers, header::CONTENT_TYPE.as_str(), DEFAULT_MIME).to_string();
    let filename = header_or(&headers, FILENAME_HEADER, DEFAULT_FILENAME).to_string();

    let file = state
        .store()
        .call(move |s| s.store_file(&session, &filename, &mime, &body))
        .await?;
    tracing::info!("Stored file {} ({} bytes)", file.id, file.size);
    Ok((StatusCode::CREATED, Json(file)))
}
