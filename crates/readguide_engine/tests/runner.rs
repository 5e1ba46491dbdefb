mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use readguide_core::LifecycleEvent;
use readguide_engine::{GenerationParams, JobOutcome, SourceDescriptor, Stage};
use support::{runner, FakeExtractor, FakeGenerator, MemoryStore, RecordingSink};
use tokio_util::sync::CancellationToken;

fn progress(index: usize, stage: Stage) -> LifecycleEvent {
    LifecycleEvent::JobProgress {
        index,
        detail: stage.description().to_string(),
    }
}

#[tokio::test]
async fn successful_job_reports_every_stage() {
    let store = Arc::new(MemoryStore::default());
    let runner = runner(
        FakeExtractor::default(),
        FakeGenerator::default(),
        store.clone(),
    );
    let sink = RecordingSink::default();

    let outcome = runner
        .run(
            3,
            &SourceDescriptor::new("a.md", "/docs/a.md"),
            &GenerationParams::default(),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, JobOutcome::Completed("id-a.md".to_string()));
    assert_eq!(
        sink.take(),
        vec![
            LifecycleEvent::JobStarted {
                index: 3,
                detail: "a.md".to_string()
            },
            progress(3, Stage::Extracting),
            progress(3, Stage::Generating),
            progress(3, Stage::Classifying),
            progress(3, Stage::Saving),
            LifecycleEvent::JobCompleted {
                index: 3,
                result_id: "id-a.md".to_string()
            },
        ]
    );

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].guide, "guide for text of a.md as academic-mentor");
    assert_eq!(saved[0].classification.tags, vec!["tag"]);
    assert_eq!(saved[0].generated_utc, "2026-01-01T00:00:00+00:00");
}

#[tokio::test]
async fn extraction_failure_ends_with_job_failed() {
    let store = Arc::new(MemoryStore::default());
    let extractor = FakeExtractor {
        fail: ["bad.md".to_string()].into(),
        ..FakeExtractor::default()
    };
    let runner = runner(extractor, FakeGenerator::default(), store.clone());
    let sink = RecordingSink::default();

    let outcome = runner
        .run(
            0,
            &SourceDescriptor::new("bad.md", "/docs/bad.md"),
            &GenerationParams::default(),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    let message = "extraction failed: document has no text content".to_string();
    assert_eq!(outcome, JobOutcome::Failed(message.clone()));
    let events = sink.take();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1], progress(0, Stage::Extracting));
    assert_eq!(events[2], LifecycleEvent::JobFailed { index: 0, message });
    assert!(store.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn classification_failure_falls_back() {
    let store = Arc::new(MemoryStore::default());
    let generator = FakeGenerator {
        classify_fails: true,
        ..FakeGenerator::default()
    };
    let runner = runner(FakeExtractor::default(), generator, store.clone());
    let sink = RecordingSink::default();

    let outcome = runner
        .run(
            0,
            &SourceDescriptor::new("a.md", "/docs/a.md"),
            &GenerationParams::default(),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success());
    let saved = store.saved.lock().unwrap();
    assert!(saved[0].classification.tags.is_empty());
    assert_eq!(saved[0].classification.description, "AI generated reading guide");
}

#[tokio::test]
async fn cancelled_job_emits_no_terminal_event() {
    let generator = FakeGenerator {
        block_forever: true,
        ..FakeGenerator::default()
    };
    let runner = runner(
        FakeExtractor::default(),
        generator,
        Arc::new(MemoryStore::default()),
    );
    let sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = runner
        .run(
            0,
            &SourceDescriptor::new("a.md", "/docs/a.md"),
            &GenerationParams::default(),
            &sink,
            &cancel,
        )
        .await;

    assert_eq!(outcome, JobOutcome::Cancelled);
    let events = sink.take();
    assert!(events.iter().all(|event| !event.is_job_terminal()));
    assert_eq!(events.last(), Some(&progress(0, Stage::Generating)));
}

#[tokio::test]
async fn already_cancelled_job_does_not_start() {
    let runner = runner(
        FakeExtractor::default(),
        FakeGenerator::default(),
        Arc::new(MemoryStore::default()),
    );
    let sink = RecordingSink::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = runner
        .run(
            0,
            &SourceDescriptor::new("a.md", "/docs/a.md"),
            &GenerationParams::default(),
            &sink,
            &cancel,
        )
        .await;
    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(sink.take().is_empty());
}
