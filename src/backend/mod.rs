//! Backend client for the local inference server
//!
//! The [`Backend`] trait is the seam between the dispatcher and the
//! inference server. Streaming operations hand back the raw response body as
//! a [`BodyStream`]; framing it into records is the relay's job.

pub mod ollama;
pub mod types;

pub use ollama::OllamaBackend;
pub use types::{ChatMessage, GenerationOptions, ModelTag, Role, TagsResponse};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Raw streaming response body from the backend
///
/// Transport failures surface as `std::io::Error` items; a timed-out body
/// carries `ErrorKind::TimedOut`.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Operations offered by an inference server
///
/// Each call is a single attempt: failures are returned to the caller as
/// `LaimError::BackendUnavailable`, `LaimError::BackendRejected` or
/// `LaimError::BackendProtocol`, never retried.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Single-turn generation; the body is newline-delimited records carrying
    /// a `response` fragment
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<BodyStream>;

    /// Multi-turn chat; the body is newline-delimited records carrying a
    /// `message.content` fragment
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<BodyStream>;

    /// Installed models
    async fn list_models(&self) -> Result<Vec<ModelTag>>;

    /// Download a model; the body is newline-delimited progress records
    async fn pull(&self, model: &str) -> Result<BodyStream>;

    /// Remove an installed model
    async fn delete(&self, model: &str) -> Result<()>;
}
