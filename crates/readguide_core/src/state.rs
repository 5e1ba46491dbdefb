use readguide_logging::{guide_debug, guide_warn};

use crate::view_model::{BatchViewModel, JobRowView};
use crate::{JobIndex, LifecycleEvent};

/// Message shown for a job before its first event arrives.
pub const PENDING_PLACEHOLDER: &str = "waiting to start...";
const PROCESSING_MESSAGE: &str = "processing...";
const COMPLETED_MESSAGE: &str = "guide generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Client-side mirror of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub index: JobIndex,
    pub source_name: String,
    pub state: JobState,
    pub detail: String,
    pub result_id: Option<String>,
}

impl JobRecord {
    fn pending(index: JobIndex, source_name: String) -> Self {
        Self {
            index,
            source_name,
            state: JobState::Pending,
            detail: PENDING_PLACEHOLDER.to_string(),
            result_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPhase {
    /// Connection open, events still expected.
    #[default]
    Streaming,
    /// `batch-completed` observed.
    Completed,
    /// Channel closed without a batch summary.
    Interrupted,
    /// Client cancelled the batch.
    Cancelled,
}

/// Per-batch state rebuilt from the interleaved event stream.
///
/// Jobs are addressed by submission index only; arrival order across jobs carries no
/// meaning. Once the batch leaves [`BatchPhase::Streaming`] nothing mutates the jobs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchState {
    jobs: Vec<JobRecord>,
    phase: BatchPhase,
    summary: Option<String>,
    dirty: bool,
}

impl BatchState {
    /// One pending job per submitted source, in submission order.
    pub fn new<I, S>(source_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let jobs = source_names
            .into_iter()
            .enumerate()
            .map(|(index, name)| JobRecord::pending(index, name.into()))
            .collect();
        Self {
            jobs,
            ..Self::default()
        }
    }

    /// Pre-size to `total` anonymous jobs; names are filled in by `job-started`.
    pub fn with_total(total: usize) -> Self {
        Self::new(std::iter::repeat_n(String::new(), total))
    }

    pub fn total_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    pub fn job(&self, index: JobIndex) -> Option<&JobRecord> {
        self.jobs.get(index)
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Apply one decoded event. Returns whether any state changed.
    pub fn apply(&mut self, event: &LifecycleEvent) -> bool {
        if self.phase != BatchPhase::Streaming {
            guide_debug!("Ignoring {} after batch left streaming phase", event.kind());
            return false;
        }

        if let LifecycleEvent::BatchCompleted { summary } = event {
            self.phase = BatchPhase::Completed;
            self.summary = Some(summary.clone());
            self.dirty = true;
            return true;
        }

        let Some(index) = event.index() else {
            return false;
        };
        let total = self.jobs.len();
        let Some(job) = self.jobs.get_mut(index) else {
            guide_warn!(
                "Protocol violation: {} for job {} outside batch of {}",
                event.kind(),
                index,
                total
            );
            return false;
        };
        if job.state.is_terminal() {
            guide_warn!(
                "Protocol violation: {} for job {} which is already terminal",
                event.kind(),
                index
            );
            return false;
        }

        match event {
            LifecycleEvent::JobStarted { detail, .. } => {
                if job.source_name.is_empty() && !detail.is_empty() {
                    job.source_name = detail.clone();
                }
                job.state = JobState::Processing;
                job.detail = PROCESSING_MESSAGE.to_string();
            }
            LifecycleEvent::JobProgress { detail, .. } => {
                job.state = JobState::Processing;
                job.detail = detail.clone();
            }
            LifecycleEvent::JobCompleted { result_id, .. } => {
                job.state = JobState::Completed;
                job.detail = COMPLETED_MESSAGE.to_string();
                job.result_id = Some(result_id.clone());
            }
            LifecycleEvent::JobFailed { message, .. } => {
                job.state = JobState::Failed;
                job.detail = message.clone();
            }
            LifecycleEvent::BatchCompleted { .. } => return false,
        }
        self.dirty = true;
        true
    }

    /// The channel ended. Without a prior summary the batch counts as interrupted.
    pub fn close_stream(&mut self) {
        if self.phase == BatchPhase::Streaming {
            self.phase = BatchPhase::Interrupted;
            self.dirty = true;
        }
    }

    /// Returns `true` if the batch was still streaming and is now cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.phase != BatchPhase::Streaming {
            return false;
        }
        self.phase = BatchPhase::Cancelled;
        self.dirty = true;
        true
    }

    /// Back to all-pending with the same sources, as for a freshly opened view.
    pub fn reset(&mut self) {
        let names = self.jobs.iter().map(|job| job.source_name.clone());
        *self = Self::new(names.collect::<Vec<_>>());
        self.dirty = true;
    }

    pub fn completed_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.state.is_terminal()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count_in(JobState::Failed)
    }

    pub fn succeeded_count(&self) -> usize {
        self.count_in(JobState::Completed)
    }

    /// `round(100 * completed / total)`, half rounded up.
    pub fn overall_progress_percent(&self) -> u8 {
        let total = self.jobs.len();
        if total == 0 {
            return if self.is_done() { 100 } else { 0 };
        }
        let completed = self.completed_count();
        ((200 * completed + total) / (2 * total)) as u8
    }

    pub fn has_errors(&self) -> bool {
        self.jobs.iter().any(|job| job.state == JobState::Failed)
    }

    /// True only once the producer confirmed completion with a batch summary.
    pub fn is_done(&self) -> bool {
        self.phase == BatchPhase::Completed
    }

    /// True once no further events will be applied, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.phase != BatchPhase::Streaming
    }

    /// Returns whether a re-render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> BatchViewModel {
        BatchViewModel {
            phase: self.phase,
            total_jobs: self.total_jobs(),
            completed_count: self.completed_count(),
            failed_count: self.failed_count(),
            overall_progress_percent: self.overall_progress_percent(),
            has_errors: self.has_errors(),
            is_done: self.is_done(),
            status_line: self.status_line(),
            jobs: self
                .jobs
                .iter()
                .map(|job| JobRowView {
                    index: job.index,
                    source_name: job.source_name.clone(),
                    state: job.state,
                    detail: job.detail.clone(),
                    result_id: job.result_id.clone(),
                })
                .collect(),
            dirty: self.dirty,
        }
    }

    fn count_in(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|job| job.state == state).count()
    }

    fn status_line(&self) -> String {
        match self.phase {
            BatchPhase::Streaming => format!(
                "processing {}/{} ({}%)",
                self.completed_count(),
                self.total_jobs(),
                self.overall_progress_percent()
            ),
            BatchPhase::Completed => {
                let failed = self.failed_count();
                let base = self.summary.clone().unwrap_or_else(|| "batch finished".into());
                if failed > 0 {
                    format!("{base} ({failed} failed)")
                } else {
                    base
                }
            }
            BatchPhase::Interrupted => "processing interrupted".to_string(),
            BatchPhase::Cancelled => "cancelled".to_string(),
        }
    }
}
