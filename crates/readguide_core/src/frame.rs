use readguide_logging::{guide_debug, guide_warn};

use crate::{EventKind, JobIndex, LifecycleEvent};

/// Separator between the job index and the detail text in a frame body.
pub const INDEX_DELIMITER: char = '|';

/// Smallest self-delimited unit on the streaming channel: a kind tag plus a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: String,
    pub body: String,
}

impl Frame {
    pub fn new(kind: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            body: body.into(),
        }
    }

    /// Serialize as one `text/event-stream` event.
    ///
    /// Every body line becomes its own `data:` field so that line breaks inside a
    /// detail message cannot terminate the frame early.
    pub fn to_sse(&self) -> String {
        let body = self.body.replace("\r\n", "\n").replace('\r', "\n");
        let mut out = String::with_capacity(self.kind.len() + body.len() + 16);
        out.push_str("event: ");
        out.push_str(&self.kind);
        out.push('\n');
        for line in body.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),
    #[error("frame body has no valid job index: {body:?}")]
    MalformedIndex { body: String },
}

/// Encode a lifecycle event into exactly one frame. Cannot fail.
pub fn encode(event: &LifecycleEvent) -> Frame {
    let kind = event.kind();
    let body = match event.index() {
        Some(index) => format!("{index}{INDEX_DELIMITER}{}", event.detail()),
        None => event.detail().to_string(),
    };
    Frame::new(kind.tag(), body)
}

/// Split a job frame body on the first delimiter only.
///
/// Everything after the first `|`, including further `|`, belongs to the detail.
/// A head made of digits that does not fit a [`JobIndex`] saturates to
/// `JobIndex::MAX`, which no batch can address.
pub fn split_body(body: &str) -> Result<(JobIndex, &str), DecodeError> {
    let malformed = || DecodeError::MalformedIndex {
        body: body.to_string(),
    };
    let (head, detail) = body.split_once(INDEX_DELIMITER).ok_or_else(malformed)?;
    let head = head.trim();
    let index = match head.parse::<JobIndex>() {
        Ok(index) => index,
        Err(_) if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) => JobIndex::MAX,
        Err(_) => return Err(malformed()),
    };
    Ok((index, detail))
}

/// Strict variant of [`decode_frame`] used for diagnostics and tests.
pub fn try_decode_frame(frame: &Frame) -> Result<LifecycleEvent, DecodeError> {
    let kind = EventKind::from_tag(frame.kind.trim())
        .ok_or_else(|| DecodeError::UnknownKind(frame.kind.clone()))?;
    if !kind.carries_index() {
        return Ok(LifecycleEvent::from_parts(kind, 0, frame.body.clone()));
    }
    let (index, detail) = split_body(&frame.body)?;
    Ok(LifecycleEvent::from_parts(kind, index, detail.to_string()))
}

/// Decode a frame into a typed event, degrading gracefully.
///
/// Unknown kinds yield `None` so newer producers can add kinds. A job frame whose
/// body has no parseable index is kept with index 0 and the whole body as detail.
pub fn decode_frame(frame: &Frame) -> Option<LifecycleEvent> {
    match try_decode_frame(frame) {
        Ok(event) => Some(event),
        Err(DecodeError::UnknownKind(kind)) => {
            guide_debug!("Ignoring frame with unknown kind {:?}", kind);
            None
        }
        Err(err @ DecodeError::MalformedIndex { .. }) => {
            guide_warn!("Malformed frame of kind {}: {}", frame.kind, err);
            let kind = EventKind::from_tag(frame.kind.trim())?;
            Some(LifecycleEvent::from_parts(kind, 0, frame.body.clone()))
        }
    }
}
