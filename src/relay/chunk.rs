//! Shape of one streamed backend record

use serde::Deserialize;

/// One newline-delimited JSON record from the backend
///
/// Generation records carry `response`, chat records carry
/// `message.content`, pull progress records carry `status`. An `error` key
/// is the backend's in-band failure signal after a successful status line.
#[derive(Debug, Default, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl Chunk {
    /// Text fragment carried by this record, if any
    pub fn fragment(&self) -> Option<&str> {
        self.response
            .as_deref()
            .or_else(|| self.message.as_ref().map(|m| m.content.as_str()))
    }

    /// Whether a pull progress record reports the download finished
    pub fn is_pull_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}
