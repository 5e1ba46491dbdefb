use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a persisted guide, as returned by a [`crate::GuideStore`].
pub type ArtifactId = String;

/// Reference to one document submitted in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Human-readable label, usually the original file name.
    pub name: String,
    pub path: PathBuf,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Lower-cased extension of the path, without the dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Profile and model selectors, forwarded to the generator untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub profile: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            profile: "academic-mentor".to_string(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Generating,
    Classifying,
    Saving,
}

impl Stage {
    /// Text sent to the client in `job-progress` frames.
    pub fn description(self) -> &'static str {
        match self {
            Stage::Extracting => "extracting content...",
            Stage::Generating => "generating guide...",
            Stage::Classifying => "extracting tags and description...",
            Stage::Saving => "saving guide...",
        }
    }
}

/// Tags and a short description derived from a generated guide.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub tags: Vec<String>,
    pub description: String,
}

/// Everything the store needs to persist one guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source_name: String,
    pub profile: String,
    pub model: Option<String>,
    pub guide: String,
    pub classification: Classification,
    pub generated_utc: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(ArtifactId),
    Failed(String),
    /// Stopped by the batch cancellation token; nothing is reported on the wire.
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch finished: {}/{} succeeded",
            self.succeeded, self.total
        )
    }
}

/// The channel to the client could not be opened or broke mid-stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("stream closed by peer")]
    Closed,
    #[error("http status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("cannot read {name}: {message}")]
    Upload { name: String, message: String },
}

/// Batch-level failure. Job failures never end up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("batch cancelled")]
    Cancelled,
}
