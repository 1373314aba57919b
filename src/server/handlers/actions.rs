use super::SessionId;
use crate::dispatcher::{ClientAction, Prepared, PreparedTurn};
use crate::relay::ChannelSink;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use std::convert::Infallible;

/// POST /api/ollama-action
///
/// Answers with JSON for `list`/`delete` and with a `text/event-stream`
/// body for `generate`/`chat`/`pull`. Validation and backend failures are
/// reported as plain JSON errors before any event is sent.
pub async fn ollama_action(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let action = ClientAction::from_json(&body)?;
    match state.dispatcher().prepare(&session, action).await? {
        Prepared::Json(value) => Ok(Json(value).into_response()),
        Prepared::Stream(turn) => Ok(event_stream(&state, turn)),
    }
}

/// Run `turn` in its own task and stream its frames as the response body
///
/// The task outlives the response: if the client goes away the turn keeps
/// going so the assistant message is still recorded. Shutdown waits for it.
fn event_stream(state: &AppState, turn: PreparedTurn) -> Response {
    let (mut sink, frames) = ChannelSink::channel(state.config().limits.channel_capacity);
    let cancel = state.shutdown().child_token();

    state.turns().spawn(async move {
        turn.run(&mut sink, &cancel).await;
    });

    let body = Body::from_stream(frames.map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET /api/models
pub async fn list_models(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let models = state.backend().list_models().await?;
    Ok(Json(serde_json::json!({ "models": models })))
}
