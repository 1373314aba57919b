//! Command handlers for the CLI
//!
//! - `serve`: run the HTTP API server
//! - `models`: list, pull and delete models on the backend

pub mod models;

/// `laim serve`
pub mod serve {
    use crate::config::Config;
    use crate::error::Result;
    use crate::server;

    /// Start the HTTP server with the resolved configuration
    pub async fn run_serve(config: Config) -> Result<()> {
        tracing::info!(
            backend = %config.backend.host,
            db = ?config.storage.db_path,
            "Starting server on {}",
            config.server.addr()
        );
        server::run(config).await
    }
}
