//! Secondary backend: OpenAI-compatible streaming chat completions

use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::collections::VecDeque;

use super::{BackendError, ChunkStream, DeltaStream, SecondaryBackend};
use crate::api::{ChatCompletionRequest, ChatMessage, StreamChunk};
use crate::config::SecondaryConfig;
use crate::wire::{FrameAssembler, DATA_PREFIX};

/// End-of-stream marker of the OpenAI SSE protocol
const DONE_MARKER: &str = "[DONE]";

pub struct OpenAiSecondary {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiSecondary {
    pub fn new(client: reqwest::Client, config: &SecondaryConfig) -> Self {
        Self {
            client,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl SecondaryBackend for OpenAiSecondary {
    async fn open(&self, messages: &[ChatMessage]) -> Result<DeltaStream, BackendError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        tracing::info!(url = %self.url, model = %self.model, "Initiating secondary completion request");

        let mut backend_req = self.client.post(&self.url).json(&request);
        if let Some(ref api_key) = self.api_key {
            backend_req = backend_req.bearer_auth(api_key);
        }

        let response = backend_req
            .send()
            .await
            .map_err(|e| BackendError::connect(&self.url, e))?;

        if !response.status().is_success() {
            return Err(BackendError::from_status(response).await);
        }

        let body: ChunkStream = response
            .bytes_stream()
            .map(|r| r.map_err(BackendError::read))
            .boxed();
        Ok(decode_deltas(body))
    }

    fn name(&self) -> &str {
        "secondary"
    }
}

/// Decode an OpenAI SSE body into non-empty content deltas.
///
/// The stream ends at `[DONE]`, at end of body, or right after the first error.
pub fn decode_deltas(body: ChunkStream) -> DeltaStream {
    stream::unfold(SseDeltaDecoder::new(body), |mut decoder| async move {
        decoder.next_delta().await.map(|item| (item, decoder))
    })
    .boxed()
}

struct SseDeltaDecoder {
    body: ChunkStream,
    assembler: FrameAssembler,
    pending: VecDeque<Result<String, BackendError>>,
    finished: bool,
}

impl SseDeltaDecoder {
    fn new(body: ChunkStream) -> Self {
        Self {
            body,
            assembler: FrameAssembler::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    async fn next_delta(&mut self) -> Option<Result<String, BackendError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.pending.clear();
                    self.finished = true;
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    for frame in self.assembler.feed(&chunk) {
                        self.push_frame(&frame);
                    }
                }
                Some(Err(e)) => self.pending.push_back(Err(e)),
                None => {
                    if let Some(frame) = self.assembler.finish() {
                        self.push_frame(&frame);
                    }
                    self.finished = true;
                }
            }
        }
    }

    fn push_frame(&mut self, frame: &str) {
        for line in frame.lines() {
            if self.finished {
                return;
            }
            // Comments, event names and ids carry no content
            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_MARKER {
                tracing::debug!("Secondary stream completed ([DONE] marker)");
                self.finished = true;
                return;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => {
                    if let Some(err) = chunk.error {
                        self.pending.push_back(Err(BackendError::Malformed(err.message)));
                        return;
                    }
                    if let Some(content) = chunk.content().filter(|c| !c.is_empty()) {
                        tracing::trace!(delta = %content, "Secondary delta");
                        self.pending.push_back(Ok(content.to_string()));
                    }
                }
                Err(e) => {
                    self.pending
                        .push_back(Err(BackendError::Malformed(format!("{}: {}", e, data))));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn body_from(chunks: Vec<Result<&str, BackendError>>) -> ChunkStream {
        let chunks: Vec<Result<Bytes, BackendError>> = chunks
            .into_iter()
            .map(|c| c.map(|s| Bytes::copy_from_slice(s.as_bytes())))
            .collect();
        stream::iter(chunks).boxed()
    }

    fn delta_line(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    async fn collect(body: ChunkStream) -> Vec<Result<String, String>> {
        decode_deltas(body)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_deltas_until_done() {
        let text = format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}{}data: [DONE]\n\n{}",
            delta_line("B"),
            delta_line("C"),
            delta_line("ignored")
        );
        let deltas = collect(body_from(vec![Ok(&text)])).await;
        assert_eq!(deltas, vec![Ok("B".to_string()), Ok("C".to_string())]);
    }

    #[tokio::test]
    async fn test_split_chunks_and_missing_done() {
        let deltas = collect(body_from(vec![
            Ok("data: {\"choices\":[{\"index\":0,\"de"),
            Ok("lta\":{\"content\":\"Hi\"}}]}\n"),
            Ok("\ndata: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"!\"}}]}"),
        ]))
        .await;
        assert_eq!(deltas, vec![Ok("Hi".to_string()), Ok("!".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_deltas_skipped() {
        let deltas = collect(body_from(vec![Ok(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"\"}}]}\n\n: ping\n\ndata: [DONE]\n\n",
        )]))
        .await;
        assert!(deltas.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_chunk_ends_stream() {
        let deltas = collect(body_from(vec![Ok(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"A\"}}]}\n\ndata: {oops\n\ndata: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"B\"}}]}\n\n",
        )]))
        .await;
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], Ok("A".to_string()));
        assert!(deltas[1].as_ref().unwrap_err().contains("malformed stream"));
    }

    #[tokio::test]
    async fn test_in_stream_error() {
        let deltas = collect(body_from(vec![Ok(
            "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
        )]))
        .await;
        assert_eq!(deltas, vec![Err("malformed stream: overloaded".to_string())]);
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let deltas = collect(body_from(vec![
            Ok("data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"A\"}}]}\n\n"),
            Err(BackendError::Read("connection reset".to_string())),
            Ok("data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"B\"}}]}\n\n"),
        ]))
        .await;
        assert_eq!(
            deltas,
            vec![
                Ok("A".to_string()),
                Err("failed to read stream: connection reset".to_string())
            ]
        );
    }
}
