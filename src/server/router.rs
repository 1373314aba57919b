use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config().server.upload_max_bytes;

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Sessions
        .route("/api/session", post(handlers::create_session))
        // Backend actions
        .route("/api/ollama-action", post(handlers::actions::ollama_action))
        .route("/api/models", get(handlers::actions::list_models))
        // Chat history
        .route(
            "/api/chats",
            get(handlers::chats::list).post(handlers::chats::create),
        )
        .route(
            "/api/chats/:id",
            get(handlers::chats::get)
                .patch(handlers::chats::rename)
                .delete(handlers::chats::delete),
        )
        .route("/api/chats/:id/messages", get(handlers::chats::messages))
        // Uploads
        .route(
            "/api/files",
            post(handlers::files::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Recommendations
        .route(
            "/api/recommendations",
            get(handlers::recommend::recommendations),
        )
        .route(
            "/api/recommendations/refresh",
            post(handlers::recommend::refresh),
        )
        .route("/api/tasks", get(handlers::recommend::tasks))
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
