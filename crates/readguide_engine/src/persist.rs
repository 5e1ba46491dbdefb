use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::filename::artifact_stem;
use crate::frontmatter::build_guide_document;
use crate::{Artifact, ArtifactId};

const GUIDE_EXTENSION: &str = "md";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("save cancelled")]
    Cancelled,
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Persists generated guides and hands back their identifiers.
#[async_trait]
pub trait GuideStore: Send + Sync {
    async fn save(
        &self,
        artifact: &Artifact,
        cancel: &CancellationToken,
    ) -> Result<ArtifactId, PersistError>;
}

/// Stores each guide as a markdown file; the file stem is the artifact id.
#[derive(Debug, Clone)]
pub struct FileGuideStore {
    writer: AtomicFileWriter,
    // Serializes id allocation so concurrent jobs never pick the same file name.
    allocate: Arc<Mutex<()>>,
}

impl FileGuideStore {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(output_dir),
            allocate: Arc::new(Mutex::new(())),
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        guide_path(self.writer.dir(), id)
    }

    fn save_blocking(&self, base: &str, document: &str) -> Result<ArtifactId, PersistError> {
        let _guard = self
            .allocate
            .lock()
            .map_err(|_| PersistError::OutputDir("guide store lock poisoned".into()))?;
        ensure_output_dir(self.writer.dir())?;
        let id = unused_id(self.writer.dir(), base);
        self.writer
            .write(&format!("{id}.{GUIDE_EXTENSION}"), document)?;
        Ok(id)
    }
}

fn guide_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{GUIDE_EXTENSION}"))
}

fn unused_id(dir: &Path, base: &str) -> ArtifactId {
    let mut id = base.to_string();
    let mut suffix = 2;
    while guide_path(dir, &id).exists() {
        id = format!("{base}-{suffix}");
        suffix += 1;
    }
    id
}

#[async_trait]
impl GuideStore for FileGuideStore {
    async fn save(
        &self,
        artifact: &Artifact,
        cancel: &CancellationToken,
    ) -> Result<ArtifactId, PersistError> {
        if cancel.is_cancelled() {
            return Err(PersistError::Cancelled);
        }
        let key = format!(
            "{}\n{}\n{}",
            artifact.source_name, artifact.profile, artifact.generated_utc
        );
        let base = artifact_stem(&artifact.source_name, &key);
        let document = build_guide_document(artifact);

        // Once started the write runs to completion so no half-written guide is left.
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save_blocking(&base, &document))
            .await
            .map_err(|err| PersistError::Io(io::Error::other(err.to_string())))?
    }
}
