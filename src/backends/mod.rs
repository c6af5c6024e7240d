//! Upstream backends: the primary knowledge base and the secondary chat model

mod client;
mod error;
mod primary;
mod secondary;

pub use client::build_http_client;
pub use error::BackendError;
pub use primary::HttpPrimary;
pub use secondary::{decode_deltas, OpenAiSecondary};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::api::{ChatMessage, InboundRequest};

/// Raw body chunks in arrival order
pub type ChunkStream = BoxStream<'static, Result<Bytes, BackendError>>;

/// Incremental text deltas from the secondary backend
pub type DeltaStream = BoxStream<'static, Result<String, BackendError>>;

/// Backend that receives the client's request first
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    /// Send the request and return the streamed response body
    async fn open(&self, request: &InboundRequest) -> Result<ChunkStream, BackendError>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Backend that takes over when the primary has no answer
#[async_trait]
pub trait SecondaryBackend: Send + Sync {
    /// Start a streaming completion for the conversation
    async fn open(&self, messages: &[ChatMessage]) -> Result<DeltaStream, BackendError>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}
