//! OpenAI-compatible chat completion type definitions

use serde::{Deserialize, Serialize};

/// Chat message, as accepted from the client and sent to the secondary backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Streaming chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

/// Streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Some providers report failures inside the stream
    #[serde(default)]
    pub error: Option<StreamError>,
}

/// Streaming choice
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Streaming delta
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// In-stream error object
#[derive(Debug, Clone, Deserialize)]
pub struct StreamError {
    #[serde(default)]
    pub message: String,
}

impl StreamChunk {
    /// Text content of the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.index == 0)
            .and_then(|c| c.delta.content.as_deref())
    }
}
