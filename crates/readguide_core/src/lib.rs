//! Readguide core: batch event protocol and the client-side progress state machine.
//!
//! Nothing in here performs IO; the engine and app crates feed bytes and messages in.
mod decoder;
mod effect;
mod event;
mod frame;
mod msg;
mod parser;
mod state;
mod update;
mod view_model;

pub use decoder::StreamDecoder;
pub use effect::Effect;
pub use event::{EventKind, JobIndex, LifecycleEvent};
pub use frame::{
    decode_frame, encode, split_body, try_decode_frame, DecodeError, Frame, INDEX_DELIMITER,
};
pub use msg::Msg;
pub use parser::{FrameParser, MAX_LINE_BYTES};
pub use state::{BatchPhase, BatchState, JobRecord, JobState, PENDING_PLACEHOLDER};
pub use update::update;
pub use view_model::{BatchViewModel, JobRowView};
