use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, Stream, StreamExt};
use readguide_core::{encode, Frame, LifecycleEvent};
use readguide_logging::{guide_debug, guide_error, guide_info, guide_warn};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::runner::JobRunner;
use crate::sink::{ChannelProgressSink, FrameSink, ProgressSink};
use crate::{
    BatchError, BatchSummary, GenerationParams, JobOutcome, SourceDescriptor, TransportError,
};

const INTERNAL_ERROR: &str = "internal error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Jobs allowed to run at the same time. Zero is treated as one.
    pub concurrency: usize,
    /// Frames buffered between the batch task and a [`FrameStream`] consumer.
    pub channel_capacity: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            channel_capacity: 16,
        }
    }
}

/// Runs every job of a batch and serializes their lifecycle onto one frame channel.
///
/// All writes go through a single writer loop, so frames never interleave. Each job
/// reports in order through its own sender, so its frames keep their relative order
/// whatever the concurrency. The `batch-completed` frame is always written last.
#[derive(Clone)]
pub struct BatchOrchestrator {
    runner: JobRunner,
    settings: BatchSettings,
}

impl BatchOrchestrator {
    pub fn new(runner: JobRunner, settings: BatchSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    /// Process `sources` and write their frames to `sink`.
    ///
    /// Job failures are reported on the wire and counted in the summary. The batch
    /// itself fails only when the sink breaks or `cancel` fires; in both cases no
    /// `batch-completed` frame is written.
    pub async fn run(
        &self,
        sources: Vec<SourceDescriptor>,
        params: GenerationParams,
        sink: &dyn FrameSink,
        cancel: CancellationToken,
    ) -> Result<BatchSummary, BatchError> {
        let total = sources.len();
        guide_info!(
            "Batch started: {} source(s), profile {}, concurrency {}",
            total,
            params.profile,
            self.settings.concurrency.max(1)
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = schedule(
            self.runner.clone(),
            self.settings.concurrency.max(1),
            sources,
            params,
            tx,
            cancel.clone(),
        );
        let writer = write_frames(rx, sink, &cancel);
        let (outcomes, written) = tokio::join!(scheduler, writer);

        if let Err(err) = written {
            guide_warn!("Batch aborted, client channel failed: {}", err);
            return Err(BatchError::Transport(err));
        }
        if cancel.is_cancelled() {
            guide_info!("Batch cancelled");
            return Err(BatchError::Cancelled);
        }

        let summary = BatchSummary {
            total,
            succeeded: outcomes.iter().filter(|o| o.is_success()).count(),
            failed: outcomes
                .iter()
                .filter(|o| matches!(o, JobOutcome::Failed(_)))
                .count(),
        };
        sink.send(encode(&LifecycleEvent::BatchCompleted {
            summary: summary.to_string(),
        }))
        .await?;
        guide_info!(
            "Batch completed: {}/{} succeeded, {} failed",
            summary.succeeded,
            summary.total,
            summary.failed
        );
        Ok(summary)
    }

    /// Run a batch on its own task and hand back its frames as a stream.
    ///
    /// Dropping the stream cancels the batch.
    pub fn spawn_stream(
        self: Arc<Self>,
        sources: Vec<SourceDescriptor>,
        params: GenerationParams,
    ) -> FrameStream {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            match self.run(sources, params, &tx, task_cancel).await {
                Ok(summary) => guide_debug!("Batch stream finished: {}", summary),
                Err(err) => guide_debug!("Batch stream ended early: {}", err),
            }
        });
        FrameStream {
            rx,
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        }
    }
}

/// Frames of a spawned batch, in wire order.
pub struct FrameStream {
    rx: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl FrameStream {
    /// Stop the batch. Frames already buffered may still be yielded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for FrameStream {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

async fn schedule(
    runner: JobRunner,
    concurrency: usize,
    sources: Vec<SourceDescriptor>,
    params: GenerationParams,
    tx: mpsc::UnboundedSender<LifecycleEvent>,
    cancel: CancellationToken,
) -> Vec<JobOutcome> {
    let params = Arc::new(params);
    stream::iter(sources.into_iter().enumerate())
        .map(move |(index, source)| {
            let runner = runner.clone();
            let params = Arc::clone(&params);
            let sink = ChannelProgressSink::new(tx.clone());
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return JobOutcome::Cancelled;
                }
                let job_sink = sink.clone();
                let job_cancel = cancel.clone();
                let handle = tokio::spawn(async move {
                    runner
                        .run(index, &source, &params, &job_sink, &job_cancel)
                        .await
                });
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        guide_error!("Job {} aborted: {}", index, err);
                        if cancel.is_cancelled() {
                            return JobOutcome::Cancelled;
                        }
                        sink.emit(LifecycleEvent::JobFailed {
                            index,
                            message: INTERNAL_ERROR.to_string(),
                        });
                        JobOutcome::Failed(INTERNAL_ERROR.to_string())
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await
}

async fn write_frames(
    mut rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    sink: &dyn FrameSink,
    cancel: &CancellationToken,
) -> Result<usize, TransportError> {
    let mut written = 0;
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if let Err(err) = sink.send(encode(&event)).await {
            cancel.cancel();
            return Err(err);
        }
        written += 1;
    }
    guide_debug!("Writer stopped after {} frame(s)", written);
    Ok(written)
}
