#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use readguide_core::{Frame, LifecycleEvent};
use readguide_engine::{
    Artifact, ArtifactId, Classification, ExtractionError, Extractor, FrameSink, GenerationError,
    GenerationParams, Generator, GuideStore, JobRunner, PersistError, ProgressSink,
    SourceDescriptor, TransportError,
};
use tokio_util::sync::CancellationToken;

/// Returns the source name as the document text, failing for configured names.
#[derive(Default)]
pub struct FakeExtractor {
    pub fail: HashSet<String>,
    pub delay: Option<Duration>,
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExtractionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if self.fail.contains(&source.name) {
            return Err(ExtractionError::Empty);
        }
        Ok(format!("text of {}", source.name))
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    pub classify_fails: bool,
    pub panic_on: Option<String>,
    pub block_forever: bool,
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(
        &self,
        text: &str,
        params: &GenerationParams,
        _cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        if self.panic_on.as_deref().is_some_and(|name| text.ends_with(name)) {
            panic!("generator exploded");
        }
        if self.block_forever {
            std::future::pending::<()>().await;
        }
        Ok(format!("guide for {text} as {}", params.profile))
    }

    async fn classify(
        &self,
        _guide: &str,
        _params: &GenerationParams,
        _cancel: &CancellationToken,
    ) -> Result<Classification, GenerationError> {
        if self.classify_fails {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(Classification {
            tags: vec!["tag".to_string()],
            description: "desc".to_string(),
        })
    }
}

/// Keeps saved artifacts in memory and names them after their source.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<Artifact>>,
}

#[async_trait]
impl GuideStore for MemoryStore {
    async fn save(
        &self,
        artifact: &Artifact,
        _cancel: &CancellationToken,
    ) -> Result<ArtifactId, PersistError> {
        self.saved.lock().unwrap().push(artifact.clone());
        Ok(format!("id-{}", artifact.source_name))
    }
}

pub fn runner(
    extractor: FakeExtractor,
    generator: FakeGenerator,
    store: Arc<MemoryStore>,
) -> JobRunner {
    JobRunner::new(Arc::new(extractor), Arc::new(generator), store)
        .with_clock(Arc::new(|| "2026-01-01T00:00:00+00:00".to_string()))
}

pub fn sources(names: &[&str]) -> Vec<SourceDescriptor> {
    names
        .iter()
        .map(|name| SourceDescriptor::new(*name, format!("/docs/{name}")))
        .collect()
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Collects frames; optionally starts failing after `fail_after` frames.
#[derive(Default)]
pub struct RecordingFrameSink {
    pub frames: Mutex<Vec<Frame>>,
    pub fail_after: Option<usize>,
}

impl RecordingFrameSink {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameSink for RecordingFrameSink {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let mut frames = self.frames.lock().unwrap();
        if self.fail_after.is_some_and(|limit| frames.len() >= limit) {
            return Err(TransportError::Closed);
        }
        frames.push(frame);
        Ok(())
    }
}
