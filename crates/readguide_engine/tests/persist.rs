use std::fs;

use readguide_engine::{
    ensure_output_dir, AtomicFileWriter, Artifact, Classification, FileGuideStore, GuideStore,
    PersistError,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn artifact(source_name: &str) -> Artifact {
    Artifact {
        source_name: source_name.to_string(),
        profile: "academic-mentor".to_string(),
        model: None,
        guide: "# Guide\n\nRead chapter 2 first.\n".to_string(),
        classification: Classification {
            tags: vec!["history".to_string(), "survey".to_string()],
            description: "A short: survey".to_string(),
        },
        generated_utc: "2026-01-01T00:00:00+00:00".to_string(),
    }
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("doc.md", "hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "doc.md");
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("doc.md", "world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn output_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("doc.md", "data");
    assert!(matches!(result, Err(PersistError::OutputDir(_))));
    assert!(!file_path.with_file_name("doc.md").exists());
}

#[tokio::test]
async fn store_writes_guide_with_header() {
    let temp = TempDir::new().unwrap();
    let store = FileGuideStore::new(temp.path().join("guides"));

    let id = store
        .save(&artifact("chapter one.txt"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(id.starts_with("chapter one--"), "{id}");

    let written = fs::read_to_string(store.path_for(&id)).unwrap();
    assert!(written.starts_with("---\nsource: \"chapter one.txt\"\n"));
    assert!(written.contains("model: \"default\"\n"));
    assert!(written.contains("tags: [\"history\",\"survey\"]\n"));
    assert!(written.contains("description: \"A short: survey\"\n"));
    assert!(written.ends_with("---\n\n# Guide\n\nRead chapter 2 first.\n"));
}

#[tokio::test]
async fn identical_artifacts_get_distinct_ids() {
    let temp = TempDir::new().unwrap();
    let store = FileGuideStore::new(temp.path().to_path_buf());
    let cancel = CancellationToken::new();

    let first = store.save(&artifact("a.md"), &cancel).await.unwrap();
    let second = store.save(&artifact("a.md"), &cancel).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(second, format!("{first}-2"));
    assert!(store.path_for(&first).exists());
    assert!(store.path_for(&second).exists());
}

#[tokio::test]
async fn cancelled_save_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let store = FileGuideStore::new(temp.path().join("guides"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = store.save(&artifact("a.md"), &cancel).await;
    assert!(matches!(result, Err(PersistError::Cancelled)));
    assert!(!temp.path().join("guides").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_saves_allocate_distinct_ids() {
    let temp = TempDir::new().unwrap();
    let store = FileGuideStore::new(temp.path().to_path_buf());

    let saves = (0..8).map(|_| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .save(&artifact("same.md"), &CancellationToken::new())
                .await
                .unwrap()
        })
    });
    let mut ids: Vec<String> = futures_util::future::join_all(saves)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 8);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 8);
    for id in &ids {
        assert!(store.path_for(id).is_file(), "{id}");
    }
}
