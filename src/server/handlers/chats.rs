use super::{parse_json, SessionId};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CreateChat {
    #[serde(default)]
    title: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct RenameChat {
    title: String,
}

/// GET /api/chats
pub async fn list(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.dispatcher().list_chats(&session).await?))
}

/// POST /api/chats
pub async fn create(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateChat = parse_json(&body)?;
    let chat = state
        .dispatcher()
        .create_chat(&session, request.title, request.model)
        .await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /api/chats/:id
pub async fn get(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.dispatcher().owned_chat(&session, &chat_id).await?))
}

/// PATCH /api/chats/:id
pub async fn rename(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Path(chat_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RenameChat = parse_json(&body)?;
    let chat = state
        .dispatcher()
        .rename_chat(&session, &chat_id, &request.title)
        .await?;
    Ok(Json(chat))
}

/// DELETE /api/chats/:id
pub async fn delete(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.dispatcher().delete_chat(&session, &chat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/chats/:id/messages
pub async fn messages(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state.dispatcher().list_messages(&session, &chat_id).await?,
    ))
}
