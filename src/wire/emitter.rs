//! Serializes events back to wire frames

use bytes::Bytes;

use super::event::Event;

/// Turns events into `data:<payload>\n\n` frames and guarantees that nothing
/// follows the terminal frame.
#[derive(Debug, Default)]
pub struct OutputEmitter {
    terminated: bool,
    frames_emitted: usize,
}

impl OutputEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize an event. Returns `None` once the terminal frame has gone out.
    pub fn emit(&mut self, event: &Event) -> Option<Bytes> {
        if self.terminated {
            tracing::warn!(event = ?event, "Dropping event emitted after the terminal frame");
            return None;
        }

        if event.is_terminal() {
            self.terminated = true;
        }
        self.frames_emitted += 1;

        Some(Bytes::from(format!("data:{}\n\n", event.to_payload())))
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }
}
