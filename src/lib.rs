//! LAIM - Local AI Model front-end library
//!
//! This library proxies a browser client to a local LLM inference server
//! (Ollama-style), relaying streamed output token by token while recording
//! conversation history in SQLite.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `backend`: inference server client and wire types
//! - `relay`: newline-delimited stream relay and record sinks
//! - `store`: conversation store (sessions, chats, messages, files)
//! - `dispatcher`: client action validation and chat turns
//! - `server`: axum HTTP API with server-sent event streaming
//! - `recommend`: hardware-based model recommendations
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli` / `commands`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use laim::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!     laim::server::run(config).await
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod recommend;
pub mod relay;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use backend::{Backend, OllamaBackend};
pub use config::Config;
pub use dispatcher::{ClientAction, Dispatcher};
pub use error::{LaimError, Result};
pub use store::{AsyncStore, ConversationStore};
