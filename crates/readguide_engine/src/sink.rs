use async_trait::async_trait;
use readguide_core::{Frame, LifecycleEvent};
use tokio::sync::mpsc;

use crate::TransportError;

/// Receives the lifecycle transitions of a running job.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// Forwards transitions to the orchestrator's writer loop.
///
/// Sends after the writer is gone are dropped silently; by then the batch is over.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }
}

/// The outbound channel of a batch. One call writes one whole frame.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;
}

#[async_trait]
impl FrameSink for mpsc::Sender<Frame> {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        mpsc::Sender::send(self, frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}
