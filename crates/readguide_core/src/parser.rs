use readguide_logging::guide_warn;

use crate::Frame;

const DEFAULT_EVENT_KIND: &str = "message";

/// Longest line kept while waiting for its terminator. Anything longer is dropped
/// together with the frame it belongs to.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` frame parser.
///
/// Accepts arbitrary byte chunks (a chunk may end in the middle of a line or of a
/// UTF-8 sequence) and returns every frame completed by a blank line. Bytes of an
/// unfinished frame stay buffered until the next call.
#[derive(Debug, Default)]
pub struct FrameParser {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    // Skipping the rest of an oversized line up to its newline.
    discarding: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let raw = &self.pending[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            start = end + 1;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.pending.drain(..start);

        if self.pending.len() > MAX_LINE_BYTES {
            guide_warn!(
                "Dropping unterminated line of {} bytes and its frame",
                self.pending.len()
            );
            self.pending.clear();
            self.event = None;
            self.data.clear();
            self.discarding = true;
        }
        frames
    }

    /// Bytes held back waiting for a line terminator.
    pub fn buffered_bytes(&self) -> usize {
        self.pending.len()
    }

    /// True when bytes or fields of an unterminated frame are buffered.
    pub fn has_partial_frame(&self) -> bool {
        !self.pending.is_empty()
            || self.discarding
            || self.event.is_some()
            || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` carry no meaning for this protocol.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let kind = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let body = std::mem::take(&mut self.data).join("\n");
        Some(Frame::new(
            kind.unwrap_or_else(|| DEFAULT_EVENT_KIND.to_string()),
            body,
        ))
    }
}
