//! Wire and domain types shared with the inference backend

use crate::error::{LaimError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LaimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(LaimError::InvalidRequest(format!(
                "unknown role '{}', expected user, assistant or system",
                other
            ))),
        }
    }
}

/// One turn of conversation context sent to the backend's chat endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Sampling options forwarded to the backend
///
/// Only the recognised keys are accepted; anything else in a client payload
/// is rejected at deserialization. Absent keys are not sent, leaving the
/// backend's own defaults in force.
///
/// # Examples
///
/// ```
/// use laim::backend::GenerationOptions;
///
/// let opts: GenerationOptions = serde_json::from_str(r#"{"temperature":0.2}"#).unwrap();
/// assert!(opts.validate().is_ok());
/// assert_eq!(serde_json::to_string(&opts).unwrap(), r#"{"temperature":0.2}"#);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationOptions {
    /// Sampling temperature, 0.0..=2.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff, 0.0..=1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate; -1 is unbounded, -2 fills the context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

impl GenerationOptions {
    pub const MAX_NUM_PREDICT: i32 = 131_072;

    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.num_predict.is_none()
    }

    /// Fill keys the caller left unset from `defaults`
    pub fn with_defaults(self, defaults: &GenerationOptions) -> Self {
        Self {
            temperature: self.temperature.or(defaults.temperature),
            top_p: self.top_p.or(defaults.top_p),
            num_predict: self.num_predict.or(defaults.num_predict),
        }
    }

    /// Check every present key against its allowed range
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(LaimError::InvalidRequest(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    t
                ))
                .into());
            }
        }

        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(LaimError::InvalidRequest(format!(
                    "top_p must be between 0.0 and 1.0, got {}",
                    p
                ))
                .into());
            }
        }

        if let Some(n) = self.num_predict {
            if !(-2..=Self::MAX_NUM_PREDICT).contains(&n) {
                return Err(LaimError::InvalidRequest(format!(
                    "num_predict must be between -2 and {}, got {}",
                    Self::MAX_NUM_PREDICT,
                    n
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// Installed model as reported by `/api/tags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTag {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub modified_at: String,
}

/// Response body of `/api/tags`
#[derive(Debug, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

/// Body of `/api/generate`
#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    #[serde(skip_serializing_if = "GenerationOptions::is_empty")]
    pub options: GenerationOptions,
}

/// Body of `/api/chat`
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "GenerationOptions::is_empty")]
    pub options: GenerationOptions,
}

/// Body of `/api/pull` and `/api/delete`
#[derive(Debug, Serialize)]
pub(crate) struct ModelActionRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(Role::System.to_string(), "system");
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_options_reject_unknown_keys() {
        let res = serde_json::from_str::<GenerationOptions>(r#"{"temperature":0.5,"seed":3}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_options_range_validation() {
        let ok = GenerationOptions {
            temperature: Some(2.0),
            top_p: Some(0.0),
            num_predict: Some(-1),
        };
        assert!(ok.validate().is_ok());

        let hot = GenerationOptions {
            temperature: Some(2.5),
            ..Default::default()
        };
        assert!(hot.validate().is_err());

        let top = GenerationOptions {
            top_p: Some(1.1),
            ..Default::default()
        };
        assert!(top.validate().is_err());

        let predict = GenerationOptions {
            num_predict: Some(-3),
            ..Default::default()
        };
        assert!(predict.validate().is_err());
    }

    #[test]
    fn test_options_with_defaults_prefers_caller() {
        let defaults = GenerationOptions {
            temperature: Some(0.7),
            top_p: Some(0.9),
            num_predict: None,
        };
        let caller = GenerationOptions {
            temperature: Some(0.1),
            ..Default::default()
        };
        let merged = caller.with_defaults(&defaults);
        assert_eq!(merged.temperature, Some(0.1));
        assert_eq!(merged.top_p, Some(0.9));
        assert_eq!(merged.num_predict, None);
    }

    #[test]
    fn test_generate_request_omits_empty_options() {
        let req = GenerateRequest {
            model: "mistral",
            prompt: "hi",
            stream: true,
            options: GenerationOptions::default(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("options").is_none());
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = vec![ChatMessage::new(Role::User, "hello")];
        let req = ChatRequest {
            model: "mistral",
            messages: &messages,
            stream: true,
            options: GenerationOptions {
                num_predict: Some(64),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn test_tags_response_tolerates_missing_fields() {
        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"mistral:latest"}]}"#).unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].size, 0);
    }
}
