use std::fmt;

/// Zero-based submission position of a job within its batch.
pub type JobIndex = usize;

/// Wire-level event kinds understood by the batch protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobStarted,
    JobProgress,
    JobCompleted,
    JobFailed,
    BatchCompleted,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::JobStarted,
        EventKind::JobProgress,
        EventKind::JobCompleted,
        EventKind::JobFailed,
        EventKind::BatchCompleted,
    ];

    /// Transport tag written in the `event:` field.
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::JobStarted => "job-started",
            EventKind::JobProgress => "job-progress",
            EventKind::JobCompleted => "job-completed",
            EventKind::JobFailed => "job-failed",
            EventKind::BatchCompleted => "batch-completed",
        }
    }

    /// Unknown tags (e.g. the single-item `content` kind) map to `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn carries_index(self) -> bool {
        !matches!(self, EventKind::BatchCompleted)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One lifecycle transition for a job, or the batch summary.
///
/// The `index|detail` text form only exists at the wire boundary, see
/// [`crate::encode`] and [`crate::decode_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    JobStarted { index: JobIndex, detail: String },
    JobProgress { index: JobIndex, detail: String },
    JobCompleted { index: JobIndex, result_id: String },
    JobFailed { index: JobIndex, message: String },
    BatchCompleted { summary: String },
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::JobStarted { .. } => EventKind::JobStarted,
            LifecycleEvent::JobProgress { .. } => EventKind::JobProgress,
            LifecycleEvent::JobCompleted { .. } => EventKind::JobCompleted,
            LifecycleEvent::JobFailed { .. } => EventKind::JobFailed,
            LifecycleEvent::BatchCompleted { .. } => EventKind::BatchCompleted,
        }
    }

    pub fn index(&self) -> Option<JobIndex> {
        match self {
            LifecycleEvent::JobStarted { index, .. }
            | LifecycleEvent::JobProgress { index, .. }
            | LifecycleEvent::JobCompleted { index, .. }
            | LifecycleEvent::JobFailed { index, .. } => Some(*index),
            LifecycleEvent::BatchCompleted { .. } => None,
        }
    }

    /// Free-text payload: stage text, artifact id, error message or summary.
    pub fn detail(&self) -> &str {
        match self {
            LifecycleEvent::JobStarted { detail, .. }
            | LifecycleEvent::JobProgress { detail, .. } => detail,
            LifecycleEvent::JobCompleted { result_id, .. } => result_id,
            LifecycleEvent::JobFailed { message, .. } => message,
            LifecycleEvent::BatchCompleted { summary } => summary,
        }
    }

    pub fn is_job_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::JobCompleted { .. } | LifecycleEvent::JobFailed { .. }
        )
    }

    pub(crate) fn from_parts(kind: EventKind, index: JobIndex, detail: String) -> Self {
        match kind {
            EventKind::JobStarted => LifecycleEvent::JobStarted { index, detail },
            EventKind::JobProgress => LifecycleEvent::JobProgress { index, detail },
            EventKind::JobCompleted => LifecycleEvent::JobCompleted {
                index,
                result_id: detail,
            },
            EventKind::JobFailed => LifecycleEvent::JobFailed {
                index,
                message: detail,
            },
            EventKind::BatchCompleted => LifecycleEvent::BatchCompleted { summary: detail },
        }
    }
}
