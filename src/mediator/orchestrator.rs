//! Per-request state machine: primary passthrough, one-way cutover to the
//! secondary backend, exactly one terminal frame.

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{Mediator, SecondaryAdapter, StreamContext};
use crate::api::{InboundRequest, RETCODE_PROXY_ERROR};
use crate::backends::{BackendError, ChunkStream};
use crate::config::{PrimaryErrorPolicy, StatsFormat};
use crate::policy::FallbackReason;
use crate::stats::format_summary;
use crate::wire::{classify, ContentEvent, Event};

enum Phase {
    Connecting,
    Primary(ChunkStream),
    Fallback(BoxStream<'static, Event>),
    Terminated,
}

/// What the primary frames of one read asked for
enum Flow {
    Continue,
    Fallback(FallbackReason),
    Terminal,
}

/// Produces the client-facing byte stream for one request.
///
/// Source moves Primary to Secondary at most once. Once the terminal frame
/// has been produced nothing else is read from either backend.
pub struct Orchestrator {
    mediator: Arc<Mediator>,
    request: InboundRequest,
    ctx: StreamContext,
    phase: Phase,
    pending: VecDeque<Event>,
    summary_logged: bool,
}

impl Orchestrator {
    pub(crate) fn new(mediator: Arc<Mediator>, request: InboundRequest) -> Self {
        let ctx = StreamContext::new(request.messages.clone());
        Self {
            mediator,
            request,
            ctx,
            phase: Phase::Connecting,
            pending: VecDeque::new(),
            summary_logged: false,
        }
    }

    pub fn correlation_id(&self) -> &str {
        self.ctx.correlation_id()
    }

    pub fn request(&self) -> &InboundRequest {
        &self.request
    }

    pub fn context(&self) -> &StreamContext {
        &self.ctx
    }

    /// Response body for the HTTP layer. Dropping it closes both backends.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, std::io::Error>> {
        stream::unfold(self, |mut orchestrator| async move {
            orchestrator
                .next_frame()
                .await
                .map(|frame| (Ok(frame), orchestrator))
        })
        .boxed()
    }

    /// Next encoded frame, or `None` after the terminal frame
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            while let Some(event) = self.pending.pop_front() {
                if let Some(frame) = self.ctx.emit(&event) {
                    tracing::trace!(
                        request_id = %self.ctx.correlation_id(),
                        source = %self.ctx.source(),
                        bytes = frame.len(),
                        "Emitting frame"
                    );
                    if self.ctx.is_terminated() {
                        self.pending.clear();
                        self.phase = Phase::Terminated;
                    }
                    return Some(frame);
                }
            }

            match std::mem::replace(&mut self.phase, Phase::Terminated) {
                Phase::Connecting => self.connect().await,
                Phase::Primary(body) => self.read_primary(body).await,
                Phase::Fallback(mut events) => {
                    if let Some(event) = events.next().await {
                        self.pending.push_back(event);
                        self.phase = Phase::Fallback(events);
                    }
                }
                Phase::Terminated => {
                    if !self.ctx.is_terminated() {
                        self.pending.push_back(Event::Terminal);
                        continue;
                    }
                    self.log_summary();
                    return None;
                }
            }
        }
    }

    async fn connect(&mut self) {
        let timeout = self.mediator.settings.primary_timeout;
        let opened = tokio::time::timeout(timeout, self.mediator.primary.open(&self.request))
            .await
            .unwrap_or(Err(BackendError::Timeout(timeout)));

        match opened {
            Ok(body) => self.phase = Phase::Primary(body),
            Err(e) => self.primary_failed(e),
        }
    }

    async fn read_primary(&mut self, mut body: ChunkStream) {
        let timeout = self.mediator.settings.primary_timeout;
        let chunk = match tokio::time::timeout(timeout, body.next()).await {
            Ok(chunk) => chunk,
            Err(_) => return self.primary_failed(BackendError::Timeout(timeout)),
        };

        match chunk {
            Some(Ok(chunk)) => {
                let frames = self.ctx.assembler().feed(&chunk);
                let buffered = self.ctx.assembler().pending_bytes();
                tracing::trace!(
                    request_id = %self.ctx.correlation_id(),
                    chunk_bytes = chunk.len(),
                    frames = frames.len(),
                    buffered,
                    "Primary chunk"
                );
                match self.process_frames(frames) {
                    Flow::Continue => self.phase = Phase::Primary(body),
                    Flow::Terminal => {
                        tracing::debug!(request_id = %self.ctx.correlation_id(), "Primary sent terminal frame");
                    }
                    Flow::Fallback(reason) => {
                        drop(body);
                        self.start_fallback(reason);
                    }
                }
            }
            Some(Err(e)) => self.primary_failed(e),
            None => {
                tracing::debug!(request_id = %self.ctx.correlation_id(), "Primary stream ended");
                let tail = self.ctx.assembler().finish();
                if let Some(frame) = tail {
                    if let Flow::Fallback(reason) = self.process_frames(vec![frame]) {
                        self.start_fallback(reason);
                    }
                }
            }
        }
    }

    /// Queue forwardable events. Stops at a trigger (which is not forwarded)
    /// or a terminal frame; everything after either is dropped.
    fn process_frames(&mut self, frames: Vec<String>) -> Flow {
        for frame in frames {
            for event in classify(&frame) {
                if let Event::Content(ref content) = event {
                    if let Some(reason) = self.mediator.policy.evaluate(content) {
                        return Flow::Fallback(reason);
                    }
                }

                let terminal = event.is_terminal();
                self.pending.push_back(event);
                if terminal {
                    return Flow::Terminal;
                }
            }
        }
        Flow::Continue
    }

    fn start_fallback(&mut self, reason: FallbackReason) {
        let discarded = self.ctx.switch_to_secondary(reason.clone());
        tracing::info!(
            request_id = %self.ctx.correlation_id(),
            reason = %reason,
            discarded_bytes = discarded,
            backend = self.mediator.secondary.name(),
            "Primary cannot answer, falling back"
        );

        let messages = self
            .ctx
            .secondary_messages(self.mediator.settings.persona.as_deref());
        self.phase = Phase::Fallback(SecondaryAdapter::run(
            Arc::clone(&self.mediator.secondary),
            messages,
            self.ctx.correlation_id().to_string(),
        ));
    }

    fn primary_failed(&mut self, error: BackendError) {
        tracing::error!(
            request_id = %self.ctx.correlation_id(),
            backend = self.mediator.primary.name(),
            "Primary backend failed: {}",
            error
        );

        if self.mediator.settings.on_primary_error == PrimaryErrorPolicy::Report {
            self.pending.push_back(Event::Content(ContentEvent::error(
                RETCODE_PROXY_ERROR,
                format!("An error occurred while proxying request: {}", error),
                "",
                self.ctx.correlation_id(),
            )));
        }
    }

    fn log_summary(&mut self) {
        if self.summary_logged {
            return;
        }
        self.summary_logged = true;

        let stats = &self.mediator.settings.stats;
        if !stats.enabled {
            return;
        }

        let formatted = format_summary(&self.ctx.summary(), stats.format);
        if stats.format == StatsFormat::Compact {
            tracing::info!("{}", formatted);
        } else {
            tracing::info!("\n{}", formatted);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if !self.summary_logged && !self.ctx.is_terminated() {
            tracing::info!(request_id = %self.ctx.correlation_id(), "Client disconnected before completion");
        }
        self.log_summary();
    }
}
