//! Inbound client request

use axum::http::HeaderMap;
use serde_json::{Map, Value};

use super::ChatMessage;

/// A parsed client request: the JSON body as received plus its headers
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub headers: HeaderMap,
    pub body: Map<String, Value>,
    /// Conversation extracted from `body.messages`
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Invalid messages: {0}")]
    InvalidMessages(serde_json::Error),
}

impl InboundRequest {
    /// Parse a raw request body. A missing or null `messages` field is an empty conversation.
    pub fn parse(headers: HeaderMap, body: &[u8]) -> Result<Self, InboundError> {
        let value: Value = serde_json::from_slice(body).map_err(InboundError::InvalidJson)?;
        let Value::Object(body) = value else {
            return Err(InboundError::NotAnObject);
        };

        let messages = match body.get("messages") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value::<Vec<ChatMessage>>(raw.clone())
                .map_err(InboundError::InvalidMessages)?,
        };

        Ok(Self {
            headers,
            body,
            messages,
        })
    }
}
