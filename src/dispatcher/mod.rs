//! Action dispatcher
//!
//! Turns a validated [`ClientAction`] into backend calls, relays streamed
//! output and records chat turns in the conversation store.
//!
//! Dispatch happens in two phases. [`Dispatcher::prepare`] does everything
//! that can fail with a plain error response: validation, ownership checks,
//! the user message append and the backend request itself. The returned
//! [`PreparedTurn`] then streams to a [`RecordSink`], persists the assistant
//! answer and writes the terminal markers. A persisted chat turn holds the
//! chat's lock from the user append until the assistant append.

pub mod action;
pub mod locks;

pub use action::{Action, ChatTarget, ClientAction};
pub use locks::{ChatGuard, ChatLocks};

use crate::backend::{Backend, BodyStream, ChatMessage, GenerationOptions, Role};
use crate::config::{Config, LimitsConfig};
use crate::error::{LaimError, Result};
use crate::relay::{self, records, RecordSink, RelayOptions, RelayOutcome, RelayReport};
use crate::store::{AsyncStore, Chat, ChatSummary, Message};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest accepted chat title
pub const MAX_TITLE_CHARS: usize = 200;

const DEFAULT_TITLE: &str = "New chat";

/// What a prepared action produces
pub enum Prepared {
    /// Streamed records (generate, chat, pull)
    Stream(PreparedTurn),
    /// A single JSON document (list, delete)
    Json(serde_json::Value),
}

impl std::fmt::Debug for Prepared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prepared::Stream(turn) => f
                .debug_struct("Stream")
                .field("action", &turn.action)
                .field("chat_id", &turn.chat_id())
                .finish(),
            Prepared::Json(value) => f.debug_tuple("Json").field(value).finish(),
        }
    }
}

/// Outcome of a streamed action
#[derive(Debug)]
pub struct TurnReport {
    pub relay: RelayReport,
    /// Chat the turn was recorded in, if any
    pub chat_id: Option<String>,
    /// The persisted assistant message
    pub assistant_message: Option<Message>,
    /// Why the assistant message could not be recorded
    pub persist_error: Option<String>,
}

struct Persistence {
    store: AsyncStore,
    guard: ChatGuard,
}

/// A backend stream ready to be relayed
pub struct PreparedTurn {
    action: &'static str,
    body: BodyStream,
    forward_only: bool,
    persistence: Option<Persistence>,
    max_record_bytes: usize,
    options: RelayOptions,
}

impl PreparedTurn {
    pub fn chat_id(&self) -> Option<&str> {
        self.persistence.as_ref().map(|p| p.guard.chat_id())
    }

    /// Relay the stream, persist the answer and write terminal markers
    ///
    /// The sink always receives `[DONE]` last (unless it has gone away).
    /// Error markers precede it when the relay did not complete or the
    /// assistant message could not be stored.
    pub async fn run<K>(self, sink: &mut K, cancel: &CancellationToken) -> TurnReport
    where
        K: RecordSink + ?Sized,
    {
        let source = records(self.body, self.max_record_bytes);
        let report = if self.forward_only {
            relay::forward(source, sink, cancel, self.options).await
        } else {
            relay::relay(source, sink, cancel, self.options).await
        };

        let mut turn = TurnReport {
            relay: report,
            chat_id: None,
            assistant_message: None,
            persist_error: None,
        };

        if let Some(persistence) = self.persistence {
            let chat_id = persistence.guard.chat_id().to_string();
            turn.chat_id = Some(chat_id.clone());

            if turn.relay.is_completed() || turn.relay.fragments > 0 {
                let text = turn.relay.text.clone();
                let target = chat_id.clone();
                match persistence
                    .store
                    .call(move |s| s.append_message(&target, Role::Assistant, &text, &[]))
                    .await
                {
                    Ok(message) => turn.assistant_message = Some(message),
                    Err(e) => {
                        tracing::error!(
                            chat_id = %chat_id,
                            "Failed to record assistant message: {:#}",
                            e
                        );
                        turn.persist_error = Some(e.to_string());
                    }
                }
            }
            drop(persistence.guard);
        }

        let mut markers: Vec<(&'static str, String)> = Vec::new();
        match &turn.relay.outcome {
            RelayOutcome::Completed => {}
            RelayOutcome::Truncated => markers.push((
                "truncated",
                "backend stream ended before completion".to_string(),
            )),
            RelayOutcome::Aborted => markers.push(("aborted", "stream was cancelled".to_string())),
            RelayOutcome::Failed(err) => {
                let message = match err {
                    LaimError::BackendRejected { body, .. } => body.clone(),
                    other => other.to_string(),
                };
                markers.push((err.kind(), message));
            }
        }
        if let Some(err) = &turn.persist_error {
            markers.push(("storage", err.clone()));
        }
        write_markers(sink, &markers, self.options.marker_timeout).await;

        tracing::info!(
            action = self.action,
            chat_id = turn.chat_id.as_deref().unwrap_or("-"),
            outcome = turn.relay.outcome.name(),
            records = turn.relay.records,
            client_connected = turn.relay.client_connected,
            "Turn finished"
        );
        turn
    }
}

/// Write error markers then `[DONE]`, giving up after `limit`
///
/// Marker writes are best effort: a closed or stalled sink only means nobody
/// is listening any more.
async fn write_markers<K>(sink: &mut K, markers: &[(&'static str, String)], limit: Duration)
where
    K: RecordSink + ?Sized,
{
    let write = async {
        for (kind, message) in markers {
            sink.send_error(kind, message).await?;
        }
        sink.send_done().await
    };
    if tokio::time::timeout(limit, write).await.is_err() {
        tracing::warn!("Client stopped reading, terminal markers dropped");
    }
}

/// Entry point for client actions and chat management
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    store: AsyncStore,
    locks: ChatLocks,
    limits: LimitsConfig,
    defaults: GenerationOptions,
    relay_options: RelayOptions,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>, store: AsyncStore, config: &Config) -> Self {
        Self {
            backend,
            store,
            locks: ChatLocks::new(),
            limits: config.limits.clone(),
            defaults: config.generation,
            relay_options: RelayOptions {
                drain_on_disconnect: config.relay.drain_on_disconnect,
                ..RelayOptions::default()
            },
        }
    }

    pub fn store(&self) -> &AsyncStore {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn locks(&self) -> &ChatLocks {
        &self.locks
    }

    fn stream(
        &self,
        action: &'static str,
        body: BodyStream,
        forward_only: bool,
        persistence: Option<Persistence>,
    ) -> Prepared {
        Prepared::Stream(PreparedTurn {
            action,
            body,
            forward_only,
            persistence,
            max_record_bytes: self.limits.max_record_bytes,
            options: self.relay_options,
        })
    }

    /// Validate `action` for `session_id` and start its backend request
    ///
    /// # Errors
    ///
    /// Validation failures are `InvalidRequest`, `NotFound` or `Forbidden`
    /// and happen before any write or backend call. Backend failures are
    /// returned as-is; for a persisted chat turn the user message has
    /// already been recorded by then.
    pub async fn prepare(&self, session_id: &str, action: ClientAction) -> Result<Prepared> {
        let action = action.validate(&self.limits, &self.defaults)?;
        tracing::debug!(action = action.name(), session_id, "Dispatching action");

        match action {
            Action::List => {
                let models = self.backend.list_models().await?;
                Ok(Prepared::Json(json!({ "models": models })))
            }
            Action::Delete { model } => {
                self.backend.delete(&model).await?;
                tracing::info!("Deleted model {}", model);
                Ok(Prepared::Json(json!({ "status": "success", "model": model })))
            }
            Action::Pull { model } => {
                let body = self.backend.pull(&model).await?;
                Ok(self.stream("pull", body, true, None))
            }
            Action::Generate {
                model,
                prompt,
                options,
                chat_id,
                files,
            } => {
                let persistence = match chat_id {
                    Some(chat_id) => Some(
                        self.begin_turn(session_id, &chat_id, prompt.clone(), files)
                            .await?,
                    ),
                    None => None,
                };
                let body = self.backend.generate(&model, &prompt, &options).await?;
                Ok(self.stream("generate", body, false, persistence))
            }
            Action::Chat {
                model,
                target: ChatTarget::Stateless { messages },
                options,
            } => {
                let body = self.backend.chat(&model, &messages, &options).await?;
                Ok(self.stream("chat", body, false, None))
            }
            Action::Chat {
                model,
                target:
                    ChatTarget::Stored {
                        chat_id,
                        message,
                        files,
                    },
                options,
            } => {
                let persistence = self.begin_turn(session_id, &chat_id, message, files).await?;

                let id = chat_id.clone();
                let history: Vec<ChatMessage> = self
                    .store
                    .call(move |s| s.list_messages(&id))
                    .await?
                    .into_iter()
                    .map(|m| ChatMessage::new(m.role, m.content))
                    .collect();

                let body = self.backend.chat(&model, &history, &options).await?;
                Ok(self.stream("chat", body, false, Some(persistence)))
            }
        }
    }

    /// Take the chat lock, check ownership and record the user message
    ///
    /// The lock is taken first so turns queue in arrival order and the
    /// ownership check sees the chat as it is once the turn may proceed.
    async fn begin_turn(
        &self,
        session_id: &str,
        chat_id: &str,
        content: String,
        files: Vec<String>,
    ) -> Result<Persistence> {
        let guard = self.locks.acquire(chat_id).await;
        self.owned_chat(session_id, chat_id).await?;

        let id = chat_id.to_string();
        self.store
            .call(move |s| s.append_message(&id, Role::User, &content, &files))
            .await?;

        Ok(Persistence {
            store: self.store.clone(),
            guard,
        })
    }

    /// Fetch a chat, requiring that `session_id` owns it
    ///
    /// A chat of another session is `Forbidden` and nothing about it is
    /// returned.
    pub async fn owned_chat(&self, session_id: &str, chat_id: &str) -> Result<Chat> {
        let id = chat_id.to_string();
        let chat = self
            .store
            .call(move |s| s.get_chat(&id))
            .await?
            .ok_or_else(|| LaimError::NotFound(format!("chat {}", chat_id)))?;
        if chat.session_id != session_id {
            return Err(
                LaimError::Forbidden("chat belongs to another session".to_string()).into(),
            );
        }
        Ok(chat)
    }

    // ------------------------------------------------------------------
    // Chat management
    // ------------------------------------------------------------------

    pub async fn list_chats(&self, session_id: &str) -> Result<Vec<ChatSummary>> {
        let session = session_id.to_string();
        self.store.call(move |s| s.list_chats(&session)).await
    }

    pub async fn create_chat(
        &self,
        session_id: &str,
        title: Option<String>,
        model: String,
    ) -> Result<Chat> {
        action::validate_model(&model)?;
        let title = match title {
            Some(title) => validate_title(&title)?,
            None => DEFAULT_TITLE.to_string(),
        };
        let session = session_id.to_string();
        self.store
            .call(move |s| s.create_chat(&session, &title, &model))
            .await
    }

    pub async fn rename_chat(&self, session_id: &str, chat_id: &str, title: &str) -> Result<Chat> {
        let title = validate_title(title)?;
        self.owned_chat(session_id, chat_id).await?;
        let id = chat_id.to_string();
        self.store.call(move |s| s.rename_chat(&id, &title)).await
    }

    /// Delete a chat once any running turn on it has finished
    pub async fn delete_chat(&self, session_id: &str, chat_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(chat_id).await;
        self.owned_chat(session_id, chat_id).await?;
        let id = chat_id.to_string();
        self.store.call(move |s| s.delete_chat(&id)).await?;
        tracing::info!("Deleted chat {}", chat_id);
        Ok(())
    }

    pub async fn list_messages(&self, session_id: &str, chat_id: &str) -> Result<Vec<Message>> {
        self.owned_chat(session_id, chat_id).await?;
        let id = chat_id.to_string();
        self.store.call(move |s| s.list_messages(&id)).await
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LaimError::InvalidRequest("title must not be empty".into()).into());
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(LaimError::InvalidRequest(format!(
            "title exceeds {} characters",
            MAX_TITLE_CHARS
        ))
        .into());
    }
    Ok(title.to_string())
}
