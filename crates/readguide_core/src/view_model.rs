use crate::{BatchPhase, JobIndex, JobState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchViewModel {
    pub phase: BatchPhase,
    pub total_jobs: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub overall_progress_percent: u8,
    pub has_errors: bool,
    pub is_done: bool,
    pub status_line: String,
    pub jobs: Vec<JobRowView>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub index: JobIndex,
    pub source_name: String,
    pub state: JobState,
    pub detail: String,
    pub result_id: Option<String>,
}
