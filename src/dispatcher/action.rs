//! Inbound client actions and their validation

use crate::backend::{ChatMessage, GenerationOptions, Role};
use crate::config::LimitsConfig;
use crate::error::{LaimError, Result};
use serde::Deserialize;

/// Longest accepted model name
pub const MAX_MODEL_NAME_CHARS: usize = 200;

/// Request body of `POST /api/ollama-action`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAction {
    pub action_type: String,
    #[serde(default)]
    pub model: String,
    pub prompt: Option<String>,
    pub message: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub options: GenerationOptions,
    pub chat_id: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// A validated action, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Generate {
        model: String,
        prompt: String,
        options: GenerationOptions,
        chat_id: Option<String>,
        files: Vec<String>,
    },
    Chat {
        model: String,
        target: ChatTarget,
        options: GenerationOptions,
    },
    Pull {
        model: String,
    },
    Delete {
        model: String,
    },
    List,
}

/// Where a chat turn takes its history from
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTarget {
    /// Persisted chat: `message` is appended, history comes from the store
    Stored {
        chat_id: String,
        message: String,
        files: Vec<String>,
    },
    /// Client-supplied history, nothing persisted
    Stateless { messages: Vec<ChatMessage> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Generate { .. } => "generate",
            Action::Chat { .. } => "chat",
            Action::Pull { .. } => "pull",
            Action::Delete { .. } => "delete",
            Action::List => "list",
        }
    }
}

/// Check a model name: non-empty and at most [`MAX_MODEL_NAME_CHARS`]
pub fn validate_model(model: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(LaimError::InvalidRequest("model is required".into()).into());
    }
    if model.chars().count() > MAX_MODEL_NAME_CHARS {
        return Err(LaimError::InvalidRequest(format!(
            "model name exceeds {} characters",
            MAX_MODEL_NAME_CHARS
        ))
        .into());
    }
    Ok(())
}

fn validate_content(field: &str, content: &str, limits: &LimitsConfig) -> Result<()> {
    if content.trim().is_empty() {
        return Err(LaimError::InvalidRequest(format!("{} must not be empty", field)).into());
    }
    if content.chars().count() > limits.max_content_chars {
        return Err(LaimError::InvalidRequest(format!(
            "{} exceeds {} characters",
            field, limits.max_content_chars
        ))
        .into());
    }
    Ok(())
}

fn required(field: &str, value: Option<String>, limits: &LimitsConfig) -> Result<String> {
    let value =
        value.ok_or_else(|| LaimError::InvalidRequest(format!("{} is required", field)))?;
    validate_content(field, &value, limits)?;
    Ok(value)
}

impl ClientAction {
    /// Decode a JSON request body
    ///
    /// Any decoding failure (unknown role, unknown option key, wrong types)
    /// is an `InvalidRequest`.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| LaimError::InvalidRequest(format!("malformed action: {}", e)).into())
    }

    /// Validate the action without touching the backend or the store
    ///
    /// Generation options are validated and merged with `defaults`.
    pub fn validate(self, limits: &LimitsConfig, defaults: &GenerationOptions) -> Result<Action> {
        let action_type = self.action_type.as_str();
        if action_type == "list" {
            return Ok(Action::List);
        }
        if !matches!(action_type, "generate" | "chat" | "pull" | "delete") {
            return Err(LaimError::InvalidRequest(format!(
                "unknown action type: {:?}",
                self.action_type
            ))
            .into());
        }

        validate_model(&self.model)?;
        let model = self.model;

        match action_type {
            "pull" => Ok(Action::Pull { model }),
            "delete" => Ok(Action::Delete { model }),
            "generate" => {
                self.options.validate()?;
                let prompt = required("prompt", self.prompt, limits)?;
                if self.chat_id.is_none() && !self.files.is_empty() {
                    return Err(LaimError::InvalidRequest(
                        "files can only be attached within a chat".into(),
                    )
                    .into());
                }
                Ok(Action::Generate {
                    model,
                    prompt,
                    options: self.options.with_defaults(defaults),
                    chat_id: self.chat_id,
                    files: self.files,
                })
            }
            _ => {
                self.options.validate()?;
                let options = self.options.with_defaults(defaults);
                let target = match self.chat_id {
                    Some(chat_id) => {
                        if self.messages.is_some() {
                            return Err(LaimError::InvalidRequest(
                                "messages cannot be combined with chatId".into(),
                            )
                            .into());
                        }
                        let message = required("message", self.message, limits)?;
                        ChatTarget::Stored {
                            chat_id,
                            message,
                            files: self.files,
                        }
                    }
                    None => {
                        if !self.files.is_empty() {
                            return Err(LaimError::InvalidRequest(
                                "files can only be attached within a chat".into(),
                            )
                            .into());
                        }
                        let messages = match (self.messages, self.message) {
                            (Some(messages), _) => messages,
                            (None, Some(message)) => vec![ChatMessage::new(Role::User, message)],
                            (None, None) => Vec::new(),
                        };
                        if messages.is_empty() {
                            return Err(LaimError::InvalidRequest(
                                "chat requires a message or messages".into(),
                            )
                            .into());
                        }
                        for message in &messages {
                            if message.content.chars().count() > limits.max_content_chars {
                                return Err(LaimError::InvalidRequest(format!(
                                    "message exceeds {} characters",
                                    limits.max_content_chars
                                ))
                                .into());
                            }
                        }
                        ChatTarget::Stateless { messages }
                    }
                };
                Ok(Action::Chat {
                    model,
                    target,
                    options,
                })
            }
        }
    }
}
