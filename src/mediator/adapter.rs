//! Re-frames secondary deltas as cumulative-answer content events

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;

use crate::api::{ChatMessage, RETCODE_PROXY_ERROR};
use crate::backends::{BackendError, DeltaStream, SecondaryBackend};
use crate::wire::{ContentEvent, Event};

/// Drives one secondary completion and yields client-facing events.
///
/// Every delta produces a content event whose answer is the full text so far.
/// The stream always ends with exactly one [`Event::Terminal`]; a failure adds
/// one error event carrying the partial answer just before it.
pub struct SecondaryAdapter;

enum Phase {
    Pending {
        backend: Arc<dyn SecondaryBackend>,
        messages: Vec<ChatMessage>,
    },
    Streaming(DeltaStream),
    Closing,
    Done,
}

struct AdapterRun {
    correlation_id: String,
    answer: String,
    phase: Phase,
}

impl SecondaryAdapter {
    pub fn run(
        backend: Arc<dyn SecondaryBackend>,
        messages: Vec<ChatMessage>,
        correlation_id: String,
    ) -> BoxStream<'static, Event> {
        let run = AdapterRun {
            correlation_id,
            answer: String::new(),
            phase: Phase::Pending { backend, messages },
        };

        stream::unfold(run, |mut run| async move {
            run.next_event().await.map(|event| (event, run))
        })
        .boxed()
    }
}

impl AdapterRun {
    async fn next_event(&mut self) -> Option<Event> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Pending { backend, messages } => {
                    match backend.open(&messages).await {
                        Ok(deltas) => self.phase = Phase::Streaming(deltas),
                        Err(e) => return Some(self.fail(e)),
                    }
                }
                Phase::Streaming(mut deltas) => match deltas.next().await {
                    Some(Ok(delta)) => {
                        if delta.is_empty() {
                            self.phase = Phase::Streaming(deltas);
                            continue;
                        }
                        self.answer.push_str(&delta);
                        self.phase = Phase::Streaming(deltas);
                        return Some(Event::Content(ContentEvent::answer(
                            self.answer.clone(),
                            self.correlation_id.clone(),
                        )));
                    }
                    Some(Err(e)) => return Some(self.fail(e)),
                    None => {
                        tracing::debug!(
                            request_id = %self.correlation_id,
                            answer_chars = self.answer.chars().count(),
                            "Secondary stream finished"
                        );
                        return Some(Event::Terminal);
                    }
                },
                Phase::Closing => return Some(Event::Terminal),
                Phase::Done => return None,
            }
        }
    }

    fn fail(&mut self, error: BackendError) -> Event {
        tracing::error!(request_id = %self.correlation_id, "Secondary backend failed: {}", error);
        self.phase = Phase::Closing;
        Event::Content(ContentEvent::error(
            RETCODE_PROXY_ERROR,
            format!("An error occurred: {}", error),
            self.answer.clone(),
            self.correlation_id.clone(),
        ))
    }
}
