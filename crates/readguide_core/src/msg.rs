use crate::LifecycleEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A decoded event arrived on the batch stream.
    EventReceived(LifecycleEvent),
    /// The stream ended (normally or not).
    StreamClosed,
    /// User asked to stop the batch.
    CancelRequested,
    /// View was reopened; start again from all-pending.
    Reset,
    /// Fallback for placeholder wiring.
    NoOp,
}
