use readguide_core::{BatchViewModel, JobRowView, JobState};

/// Text lines for one repaint: the status line, then one row per job.
pub fn render(view: &BatchViewModel) -> Vec<String> {
    let mut lines = Vec::with_capacity(view.jobs.len() + 1);
    lines.push(format!(
        "[{:>3}%] {}",
        view.overall_progress_percent, view.status_line
    ));
    lines.extend(view.jobs.iter().map(render_row));
    lines
}

fn render_row(job: &JobRowView) -> String {
    let marker = match job.state {
        JobState::Pending => ' ',
        JobState::Processing => '~',
        JobState::Completed => '+',
        JobState::Failed => '!',
    };
    let name = if job.source_name.is_empty() {
        format!("#{}", job.index)
    } else {
        job.source_name.clone()
    };
    match &job.result_id {
        Some(id) => format!("  {marker} {name}: {} ({id})", job.detail),
        None => format!("  {marker} {name}: {}", job.detail),
    }
}
