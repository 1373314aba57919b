//! HTTP API server
//!
//! JSON endpoints for sessions, chats, uploads and recommendations, plus
//! `POST /api/ollama-action`, which streams backend output to the browser as
//! server-sent events.

pub mod error;
pub mod handlers;
mod router;
mod state;

pub use error::ApiError;
pub use handlers::SESSION_HEADER;
pub use router::create_router;
pub use state::AppState;

use crate::config::Config;
use crate::error::{LaimError, Result};

/// Run the HTTP server until Ctrl-C
///
/// On shutdown the server stops accepting connections and every streaming
/// turn is cancelled. Partial answers are still recorded before `run`
/// returns.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.server.addr();
    let state = AppState::new(config)?;

    let models = state.catalog().refresh().await;
    tracing::debug!("Recommendation catalog holds {} models", models);

    let shutdown = state.shutdown().clone();
    let cancel = shutdown.clone();
    let turns = state.turns().clone();
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("LAIM server listening on http://{}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested, cancelling active streams");
            cancel.cancel();
        })
        .await;

    // Cancelled turns still record their partial answers.
    shutdown.cancel();
    turns.close();
    if !turns.is_empty() {
        tracing::info!("Waiting for {} active turns to finish", turns.len());
    }
    turns.wait().await;

    served.map_err(|e| LaimError::Config(format!("server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}
