//! Request handler for the mediated endpoint

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};

use super::server::ProxyState;
use crate::api::InboundRequest;
use crate::stats::format_request_log;

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Turns one client request into a mediated event stream
pub struct ProxyHandler {
    state: ProxyState,
}

impl ProxyHandler {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    /// Handle an incoming request.
    ///
    /// Once the body parses the response is always `200 text/event-stream`;
    /// backend failures are reported inside the stream.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let headers = req.headers().clone();

        let body_bytes = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read request body");
                return (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read request body: {}", e),
                )
                    .into_response();
            }
        };

        let request = match InboundRequest::parse(headers, &body_bytes) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting request");
                return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        };

        let orchestrator = self.state.mediator.mediate(request);
        tracing::info!(
            "{}",
            format_request_log(orchestrator.request(), orchestrator.correlation_id())
        );

        match Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(orchestrator.into_stream()))
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build streaming response");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
            }
        }
    }
}
