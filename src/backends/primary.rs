//! Primary backend over HTTP

use async_trait::async_trait;
use axum::http::header;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;

use super::{BackendError, ChunkStream, PrimaryBackend};
use crate::api::InboundRequest;
use crate::config::PrimaryConfig;

/// POSTs the client's JSON body to the primary completion endpoint and
/// streams back the response body, decoded from any content encoding the
/// forwarded `accept-encoding` allowed.
pub struct HttpPrimary {
    client: reqwest::Client,
    url: String,
    extra_fields: HashMap<String, Value>,
}

impl HttpPrimary {
    pub fn new(client: reqwest::Client, config: &PrimaryConfig) -> Self {
        Self {
            client,
            url: config.completion_url(),
            extra_fields: config.extra_fields.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PrimaryBackend for HttpPrimary {
    async fn open(&self, request: &InboundRequest) -> Result<ChunkStream, BackendError> {
        let mut body = request.body.clone();
        for (key, value) in &self.extra_fields {
            body.insert(key.clone(), value.clone());
        }

        let mut backend_req = self.client.post(&self.url);

        // Length and host change once the body is re-serialized and re-hosted
        for (name, value) in request.headers.iter() {
            if name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            backend_req = backend_req.header(name, value);
        }

        tracing::info!(url = %self.url, "Sending request to primary backend");

        let response = backend_req
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::connect(&self.url, e))?;

        tracing::info!(status = %response.status(), "Received response from primary backend");

        if !response.status().is_success() {
            return Err(BackendError::from_status(response).await);
        }

        Ok(response.bytes_stream().map(|r| r.map_err(BackendError::read)).boxed())
    }

    fn name(&self) -> &str {
        "primary"
    }
}
