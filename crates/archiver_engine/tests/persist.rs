use std::fs;

use archiver_core::{ArchivePath, CaptureRecord, MetadataStore};
use archiver_engine::{
    ensure_output_dir, load_metadata, save_metadata, AtomicFileWriter, PersistError, RunLock,
};
use chrono::NaiveDate;
use tempfile::TempDir;

fn sample_store() -> MetadataStore {
    let mut store = MetadataStore::new();
    store.record_capture(
        "https://example.org",
        CaptureRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ArchivePath::new("archive/example.org/index.html").unwrap(),
            Some("home".to_string()),
        ),
    );
    store
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
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("metadata.json", b"hello").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("metadata.json", b"world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("metadata.json", b"data").is_err());
    assert!(!file_path.with_file_name("metadata.json").exists());
}

#[test]
fn metadata_survives_save_and_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("archive").join("metadata.json");
    let store = sample_store();

    save_metadata(&path, &store).unwrap();
    assert_eq!(load_metadata(&path), store);
}

#[test]
fn empty_store_round_trips() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("metadata.json");
    save_metadata(&path, &MetadataStore::new()).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    assert!(load_metadata(&path).is_empty());
}

#[test]
fn missing_or_corrupt_metadata_loads_empty() {
    archiver_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    assert!(load_metadata(&temp.path().join("absent.json")).is_empty());

    let corrupt = temp.path().join("corrupt.json");
    fs::write(&corrupt, "{\"https://x\": {\"lastArch").unwrap();
    assert!(load_metadata(&corrupt).is_empty());

    let directory = temp.path().join("dir.json");
    fs::create_dir(&directory).unwrap();
    assert!(load_metadata(&directory).is_empty());
}

#[test]
fn unchanged_store_saves_semantically_identical_content() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("metadata.json");
    let original = r#"{
  "r/example": {
    "lastArchived": "2023-05-06",
    "archivedPath": "archive/r/example/index.html",
    "description": "wiki",
    "mirror": "primary"
  },
  "https://example.org": {
    "lastArchived": "2024-01-01",
    "archivedPath": "archive/example.org/index.html",
    "description": null
  },
  "https://legacy.example": {
    "lastArchived": "2022-02-02T10:00:00Z",
    "archivedPath": "archive/legacy.example/index.html"
  }
}"#;
    fs::write(&path, original).unwrap();

    let store = load_metadata(&path);
    assert_eq!(store.len(), 2);
    assert!(store.unreadable("https://legacy.example").is_some());
    save_metadata(&path, &store).unwrap();

    let before: serde_json::Value = serde_json::from_str(original).unwrap();
    let after: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn second_run_lock_is_refused_until_released() {
    let temp = TempDir::new().unwrap();
    let lock = RunLock::acquire(temp.path()).unwrap();
    let lock_path = temp.path().join(RunLock::FILE_NAME);
    assert_eq!(
        fs::read_to_string(&lock_path).unwrap().trim(),
        std::process::id().to_string()
    );

    let err = RunLock::acquire(temp.path()).unwrap_err();
    assert!(matches!(err, PersistError::Locked(_)));

    drop(lock);
    assert!(!lock_path.exists());
    RunLock::acquire(temp.path()).unwrap();
}

#[cfg(unix)]
#[test]
fn lock_left_by_an_exited_process_is_reclaimed() {
    archiver_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let lock_path = temp.path().join(RunLock::FILE_NAME);

    let mut child = std::process::Command::new("true").spawn().unwrap();
    let dead_pid = child.id();
    child.wait().unwrap();
    fs::write(&lock_path, format!("{dead_pid}\n")).unwrap();

    let lock = RunLock::acquire(temp.path()).unwrap();
    assert_eq!(
        fs::read_to_string(&lock_path).unwrap().trim(),
        std::process::id().to_string()
    );
    drop(lock);
    assert!(!lock_path.exists());
}

#[test]
fn lock_held_by_a_live_or_unknown_owner_is_kept() {
    let temp = TempDir::new().unwrap();
    let lock_path = temp.path().join(RunLock::FILE_NAME);

    fs::write(&lock_path, format!("{}\n", std::process::id())).unwrap();
    assert!(matches!(
        RunLock::acquire(temp.path()),
        Err(PersistError::Locked(_))
    ));

    fs::write(&lock_path, "").unwrap();
    assert!(matches!(
        RunLock::acquire(temp.path()),
        Err(PersistError::Locked(_))
    ));
    assert!(lock_path.exists());
}
