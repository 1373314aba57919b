//! Ollama backend implementation for LAIM
//!
//! This module implements the [`Backend`] trait for Ollama, connecting to a
//! local or remote Ollama server. Every operation carries its own timeout
//! from [`BackendConfig`].

use crate::backend::types::{
    ChatMessage, ChatRequest, GenerateRequest, GenerationOptions, ModelActionRequest, ModelTag,
    TagsResponse,
};
use crate::backend::{Backend, BodyStream};
use crate::config::BackendConfig;
use crate::error::{LaimError, Result};

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use std::time::Duration;

/// Inference server endpoints and their timeout class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Generate,
    Chat,
    List,
    Pull,
    Delete,
}

impl Operation {
    fn path(self) -> &'static str {
        match self {
            Operation::Generate => "/api/generate",
            Operation::Chat => "/api/chat",
            Operation::List => "/api/tags",
            Operation::Pull => "/api/pull",
            Operation::Delete => "/api/delete",
        }
    }

    fn method(self) -> Method {
        match self {
            Operation::List => Method::GET,
            Operation::Delete => Method::DELETE,
            _ => Method::POST,
        }
    }

    fn timeout(self, config: &BackendConfig) -> Duration {
        match self {
            Operation::Generate | Operation::Chat => config.generate_timeout(),
            Operation::List => config.list_timeout(),
            Operation::Pull => config.pull_timeout(),
            Operation::Delete => config.delete_timeout(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Operation::Generate => "generate",
            Operation::Chat => "chat",
            Operation::List => "list",
            Operation::Pull => "pull",
            Operation::Delete => "delete",
        }
    }
}

/// Ollama API backend
///
/// Stateless apart from its connection pool, so one instance is shared by
/// every request task.
///
/// # Examples
///
/// ```no_run
/// use laim::backend::{Backend, OllamaBackend};
/// use laim::config::BackendConfig;
///
/// # async fn example() -> laim::error::Result<()> {
/// let backend = OllamaBackend::new(BackendConfig::default())?;
/// for model in backend.list_models().await? {
///     println!("{}", model.name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct OllamaBackend {
    client: Client,
    config: BackendConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("laim/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LaimError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized Ollama backend: host={}", config.host);

        Ok(Self { client, config })
    }

    /// Configured Ollama base URL
    pub fn host(&self) -> &str {
        &self.config.host
    }

    fn url(&self, op: Operation) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), op.path())
    }

    /// Issue one request and return the response once its status is known
    /// to be a success
    async fn invoke<P: Serialize + ?Sized>(
        &self,
        op: Operation,
        payload: Option<&P>,
    ) -> Result<Response> {
        let url = self.url(op);
        let timeout = op.timeout(&self.config);
        tracing::debug!(
            "Ollama {} request: {} {} (timeout {:?})",
            op.name(),
            op.method(),
            url,
            timeout
        );

        let mut request = self
            .client
            .request(op.method(), &url)
            .timeout(timeout);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Failed to reach Ollama for {}: {}", op.name(), e);
            LaimError::BackendUnavailable(format!(
                "could not connect to inference server at {}: {}",
                self.config.host, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = error_message(&text);
            tracing::error!("Ollama {} returned error {}: {}", op.name(), status, body);
            return Err(LaimError::BackendRejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(response)
    }

    async fn invoke_stream<P: Serialize + ?Sized>(
        &self,
        op: Operation,
        payload: &P,
    ) -> Result<BodyStream> {
        let response = self.invoke(op, Some(payload)).await?;
        Ok(into_body_stream(response))
    }
}

/// Convert a successful response into a boxed byte stream
fn into_body_stream(response: Response) -> BodyStream {
    Box::pin(response.bytes_stream().map_err(|e| {
        let kind = if e.is_timeout() {
            std::io::ErrorKind::TimedOut
        } else {
            std::io::ErrorKind::Other
        };
        std::io::Error::new(kind, e)
    }))
}

/// Pull the human-readable message out of an Ollama error body
///
/// Ollama answers errors as `{"error": "..."}`; anything else is returned
/// trimmed as-is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<BodyStream> {
        let payload = GenerateRequest {
            model,
            prompt,
            stream: true,
            options: *options,
        };
        self.invoke_stream(Operation::Generate, &payload).await
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<BodyStream> {
        let payload = ChatRequest {
            model,
            messages,
            stream: true,
            options: *options,
        };
        self.invoke_stream(Operation::Chat, &payload).await
    }

    async fn list_models(&self) -> Result<Vec<ModelTag>> {
        let response = self.invoke::<()>(Operation::List, None).await?;

        let body = response.bytes().await.map_err(|e| {
            LaimError::BackendUnavailable(format!("failed to read model list: {}", e))
        })?;
        let tags: TagsResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!("Failed to parse Ollama tags response: {}", e);
            LaimError::BackendProtocol(format!("malformed model list: {}", e))
        })?;

        tracing::debug!("Ollama reported {} installed models", tags.models.len());
        Ok(tags.models)
    }

    async fn pull(&self, model: &str) -> Result<BodyStream> {
        let payload = ModelActionRequest {
            name: model,
            stream: Some(true),
        };
        tracing::info!("Pulling model {}", model);
        self.invoke_stream(Operation::Pull, &payload).await
    }

    async fn delete(&self, model: &str) -> Result<()> {
        let payload = ModelActionRequest {
            name: model,
            stream: None,
        };
        self.invoke(Operation::Delete, Some(&payload)).await?;
        tracing::info!("Deleted model {}", model);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_for(host: &str) -> OllamaBackend {
        OllamaBackend::new(BackendConfig {
            host: host.to_string(),
            ..Default::default()
        })
        .expect("backend")
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let backend = backend_for("http://localhost:11434/");
        assert_eq!(
            backend.url(Operation::Chat),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn test_operation_timeouts_follow_config() {
        let config = BackendConfig {
            generate_timeout_seconds: 1,
            list_timeout_seconds: 2,
            pull_timeout_seconds: 3,
            delete_timeout_seconds: 4,
            ..Default::default()
        };
        assert_eq!(Operation::Generate.timeout(&config), Duration::from_secs(1));
        assert_eq!(Operation::Chat.timeout(&config), Duration::from_secs(1));
        assert_eq!(Operation::List.timeout(&config), Duration::from_secs(2));
        assert_eq!(Operation::Pull.timeout(&config), Duration::from_secs(3));
        assert_eq!(Operation::Delete.timeout(&config), Duration::from_secs(4));
    }

    #[test]
    fn test_operation_methods() {
        assert_eq!(Operation::List.method(), Method::GET);
        assert_eq!(Operation::Delete.method(), Method::DELETE);
        assert_eq!(Operation::Pull.method(), Method::POST);
    }

    #[test]
    fn test_error_message_extracts_ollama_error() {
        assert_eq!(
            error_message(r#"{"error":"model 'x' not found"}"#),
            "model 'x' not found"
        );
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }
}
