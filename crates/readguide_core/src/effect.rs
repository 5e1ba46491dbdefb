#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop the connection so the producer observes the cancellation.
    CloseStream,
}
