use crate::{decode_frame, FrameParser, LifecycleEvent};

/// Byte-level decoder for one streamed connection.
///
/// Couples a [`FrameParser`] with [`decode_frame`]. Frames of unknown kind are
/// dropped and counted; the stream itself is never aborted by bad input. One
/// instance per connection.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    parser: FrameParser,
    skipped: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        for frame in self.parser.feed(chunk) {
            match decode_frame(&frame) {
                Some(event) => events.push(event),
                None => self.skipped += 1,
            }
        }
        events
    }

    /// Number of frames that could not be turned into an event so far.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    /// Consume the decoder at end of stream.
    ///
    /// Returns `true` when an unterminated frame was left behind; that frame is
    /// discarded because it may be truncated.
    pub fn finish(self) -> bool {
        self.parser.has_partial_frame()
    }
}
