use std::sync::Arc;

use chrono::Utc;
use readguide_core::{JobIndex, LifecycleEvent};
use readguide_logging::{guide_debug, guide_info, guide_warn};
use tokio_util::sync::CancellationToken;

use crate::classify::fallback_classification;
use crate::extract::{ExtractionError, Extractor};
use crate::generate::{GenerationError, Generator};
use crate::persist::{GuideStore, PersistError};
use crate::sink::ProgressSink;
use crate::{Artifact, ArtifactId, GenerationParams, JobOutcome, SourceDescriptor, Stage};

/// Anything that can go wrong inside one job. Never leaves the job boundary.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("saving failed: {0}")]
    Persist(#[from] PersistError),
    #[error("job cancelled")]
    Cancelled,
}

impl JobError {
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            JobError::Cancelled
                | JobError::Extraction(ExtractionError::Cancelled)
                | JobError::Generation(GenerationError::Cancelled)
                | JobError::Persist(PersistError::Cancelled)
        )
    }
}

/// Runs extraction, generation and persistence for one document.
///
/// Emits `job-started`, one `job-progress` per stage and exactly one terminal event
/// through the sink, unless the batch is cancelled first.
#[derive(Clone)]
pub struct JobRunner {
    extractor: Arc<dyn Extractor>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn GuideStore>,
    generated_utc: Arc<dyn Fn() -> String + Send + Sync>,
}

impl JobRunner {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn GuideStore>,
    ) -> Self {
        Self {
            extractor,
            generator,
            store,
            generated_utc: Arc::new(|| Utc::now().to_rfc3339()),
        }
    }

    /// Replace the timestamp source, e.g. with a fixed value in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.generated_utc = clock;
        self
    }

    pub async fn run(
        &self,
        index: JobIndex,
        source: &SourceDescriptor,
        params: &GenerationParams,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }
        guide_info!("Job {} started: {}", index, source.name);
        sink.emit(LifecycleEvent::JobStarted {
            index,
            detail: source.name.clone(),
        });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(JobError::Cancelled),
            result = self.pipeline(index, source, params, sink, cancel) => result,
        };

        match result {
            Ok(result_id) => {
                guide_info!("Job {} completed: {}", index, result_id);
                sink.emit(LifecycleEvent::JobCompleted {
                    index,
                    result_id: result_id.clone(),
                });
                JobOutcome::Completed(result_id)
            }
            Err(err) if err.is_cancellation() => {
                guide_debug!("Job {} cancelled", index);
                JobOutcome::Cancelled
            }
            Err(err) => {
                let message = err.to_string();
                guide_warn!("Job {} failed: {}", index, message);
                sink.emit(LifecycleEvent::JobFailed {
                    index,
                    message: message.clone(),
                });
                JobOutcome::Failed(message)
            }
        }
    }

    async fn pipeline(
        &self,
        index: JobIndex,
        source: &SourceDescriptor,
        params: &GenerationParams,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ArtifactId, JobError> {
        let progress = |stage: Stage| {
            sink.emit(LifecycleEvent::JobProgress {
                index,
                detail: stage.description().to_string(),
            })
        };

        progress(Stage::Extracting);
        let text = self.extractor.extract(source, cancel).await?;

        progress(Stage::Generating);
        let guide = self.generator.generate(&text, params, cancel).await?;

        progress(Stage::Classifying);
        let classification = match self.generator.classify(&guide, params, cancel).await {
            Ok(classification) => classification,
            Err(GenerationError::Cancelled) => return Err(JobError::Cancelled),
            Err(err) => {
                guide_warn!("Job {} classification skipped: {}", index, err);
                fallback_classification()
            }
        };

        progress(Stage::Saving);
        let artifact = Artifact {
            source_name: source.name.clone(),
            profile: params.profile.clone(),
            model: params.model.clone(),
            guide,
            classification,
            generated_utc: (self.generated_utc)(),
        };
        Ok(self.store.save(&artifact, cancel).await?)
    }
}
