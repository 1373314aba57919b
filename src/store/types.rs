use crate::backend::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Browser client identity used to scope chats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A titled conversation thread owned by one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub session_id: String,
    pub title: String,
    /// Model the chat talks to
    pub model: String,
    pub created_at: DateTime<Utc>,
    /// Advances on every appended message
    pub updated_at: DateTime<Utc>,
}

/// Chat metadata as shown in a chat list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub message_count: usize,
}

/// One immutable conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    /// Ids of files attached to this message
    #[serde(default)]
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Uploaded file metadata (the blob itself stays in the database)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub session_id: String,
    pub message_id: Option<String>,
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}
