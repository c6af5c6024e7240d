//! Reassembles frames from arbitrarily split transport chunks

/// Two consecutive newlines close a frame
pub const FRAME_SEPARATOR: &[u8] = b"\n\n";

/// Splits a byte stream into complete frames.
///
/// The undelimited tail is kept as raw bytes, so a separator or a multi-byte
/// character split across chunks is handled once the rest arrives.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to contain no separator
    scanned: usize,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completes, in byte order.
    /// Blank frames are skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut search = self.scanned.saturating_sub(FRAME_SEPARATOR.len() - 1);

        while let Some(pos) = find_separator(&self.buffer[search..]) {
            let end = search + pos;
            push_frame(&mut frames, &self.buffer[start..end]);
            start = end + FRAME_SEPARATOR.len();
            search = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self.buffer.len();

        frames
    }

    /// Number of buffered bytes not yet part of a complete frame
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drop anything buffered and return how many bytes were discarded
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        dropped
    }

    /// Flush the remainder at end of stream as a final frame
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let mut frames = Vec::with_capacity(1);
        push_frame(&mut frames, &rest);
        frames.pop()
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_SEPARATOR.len())
        .position(|w| w == FRAME_SEPARATOR)
}

fn push_frame(frames: &mut Vec<String>, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    if !text.trim().is_empty() {
        frames.push(text.into_owned());
    }
}
