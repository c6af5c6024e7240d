//! Per-request stream state

use bytes::Bytes;
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

use crate::api::ChatMessage;
use crate::policy::FallbackReason;
use crate::stats::{Outcome, Source, StreamSummary};
use crate::wire::{Event, FrameAssembler, OutputEmitter};

/// State owned by one request from acceptance until the body closes
#[derive(Debug)]
pub struct StreamContext {
    correlation_id: String,
    messages: Vec<ChatMessage>,
    source: Source,
    assembler: FrameAssembler,
    emitter: OutputEmitter,
    fallback_reason: Option<FallbackReason>,
    primary_events: usize,
    secondary_events: usize,
    answer_chars: usize,
    started: Instant,
}

impl StreamContext {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self::with_correlation_id(Uuid::new_v4().to_string(), messages)
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            messages,
            source: Source::Primary,
            assembler: FrameAssembler::new(),
            emitter: OutputEmitter::new(),
            fallback_reason: None,
            primary_events: 0,
            secondary_events: 0,
            answer_chars: 0,
            started: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        self.fallback_reason.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.emitter.is_terminated()
    }

    pub(crate) fn assembler(&mut self) -> &mut FrameAssembler {
        &mut self.assembler
    }

    /// Mark the cutover and drop whatever primary bytes are still buffered.
    /// Returns the number of bytes discarded.
    pub fn switch_to_secondary(&mut self, reason: FallbackReason) -> usize {
        self.source = Source::Secondary;
        self.fallback_reason = Some(reason);
        self.assembler.discard()
    }

    /// Conversation for the secondary backend, with the persona first when set
    pub fn secondary_messages(&self, persona: Option<&str>) -> Vec<ChatMessage> {
        persona
            .map(ChatMessage::system)
            .into_iter()
            .chain(self.messages.iter().cloned())
            .collect()
    }

    /// Serialize an event to a frame, counting it against the active source
    pub fn emit(&mut self, event: &Event) -> Option<Bytes> {
        let frame = self.emitter.emit(event)?;

        match event {
            Event::Terminal => {}
            Event::Content(content) => {
                self.answer_chars = content.answer_text().chars().count();
                self.count_event();
            }
            Event::Raw(_) => self.count_event(),
        }

        Some(frame)
    }

    fn count_event(&mut self) {
        match self.source {
            Source::Primary => self.primary_events += 1,
            Source::Secondary => self.secondary_events += 1,
        }
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            request_id: self.correlation_id.clone(),
            timestamp: Utc::now(),
            source: self.source,
            fallback_reason: self.fallback_reason.as_ref().map(ToString::to_string),
            primary_events: self.primary_events,
            secondary_events: self.secondary_events,
            frames_emitted: self.emitter.frames_emitted(),
            answer_chars: self.answer_chars,
            outcome: if self.is_terminated() {
                Outcome::Completed
            } else {
                Outcome::Aborted
            },
            duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ContentEvent;

    #[test]
    fn test_new_generates_correlation_id() {
        let a = StreamContext::new(Vec::new());
        let b = StreamContext::new(Vec::new());
        assert_ne!(a.correlation_id(), b.correlation_id());
        assert!(Uuid::parse_str(a.correlation_id()).is_ok());
        assert_eq!(a.source(), Source::Primary);
    }

    #[test]
    fn test_secondary_messages_with_persona() {
        let ctx = StreamContext::with_correlation_id("id", vec![ChatMessage::user("hi")]);
        assert_eq!(ctx.secondary_messages(None), vec![ChatMessage::user("hi")]);
        assert_eq!(
            ctx.secondary_messages(Some("Be kind.")),
            vec![ChatMessage::system("Be kind."), ChatMessage::user("hi")]
        );
    }

    #[test]
    fn test_switch_discards_buffer() {
        let mut ctx = StreamContext::with_correlation_id("id", Vec::new());
        ctx.assembler().feed(b"data:{\"partial");
        let dropped = ctx.switch_to_secondary(FallbackReason::SentinelRetcode(100));
        assert_eq!(dropped, "data:{\"partial".len());
        assert_eq!(ctx.source(), Source::Secondary);
        assert_eq!(ctx.fallback_reason(), Some(&FallbackReason::SentinelRetcode(100)));
    }

    #[test]
    fn test_summary_counts() {
        let mut ctx = StreamContext::with_correlation_id("id", Vec::new());
        ctx.emit(&Event::Content(ContentEvent::answer("A", "id"))).unwrap();
        ctx.emit(&Event::Raw("x".to_string())).unwrap();
        ctx.switch_to_secondary(FallbackReason::SentinelRetcode(100));
        ctx.emit(&Event::Content(ContentEvent::answer("BCD", "id"))).unwrap();

        let aborted = ctx.summary();
        assert_eq!(aborted.outcome, Outcome::Aborted);

        ctx.emit(&Event::Terminal).unwrap();
        assert!(ctx.emit(&Event::Raw("late".to_string())).is_none());

        let summary = ctx.summary();
        assert_eq!(summary.primary_events, 2);
        assert_eq!(summary.secondary_events, 1);
        assert_eq!(summary.frames_emitted, 4);
        assert_eq!(summary.answer_chars, 3);
        assert_eq!(summary.source, Source::Secondary);
        assert_eq!(summary.fallback_reason.as_deref(), Some("retcode 100"));
        assert_eq!(summary.outcome, Outcome::Completed);
    }
}
