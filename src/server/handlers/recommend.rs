use crate::recommend::HardwareQuery;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::collections::HashMap;

/// GET /api/recommendations?vram=&ram=&task=
pub async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = HardwareQuery::from_params(
        params.get("vram").map(String::as_str),
        params.get("ram").map(String::as_str),
        params.get("task").map(String::as_str),
    )?;
    let picks = state.catalog().recommend(&query).await;
    Ok(Json(json!({
        "current_hardware": { "vram_gb": query.vram_gb, "ram_gb": query.ram_gb },
        "task": query.task,
        "recommendations": picks,
    })))
}

/// GET /api/tasks
pub async fn tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "tasks": state.catalog().tasks().await }))
}

/// POST /api/recommendations/refresh
pub async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    let count = state.catalog().refresh().await;
    Json(json!({ "models": count }))
}
