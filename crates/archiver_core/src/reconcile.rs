use chrono::NaiveDate;

use crate::{ArchivePath, Artifact, CaptureOutcome, CaptureRecord, MetadataStore, SkipReason};

/// Record a successful capture, replacing any previous record for the artifact.
///
/// A path outside `archive_dir` is never recorded; the previous record stays.
pub fn record_success(
    store: &mut MetadataStore,
    artifact: &Artifact,
    archive_dir: &ArchivePath,
    local_path: ArchivePath,
    today: NaiveDate,
) -> CaptureOutcome {
    if !local_path.is_under(archive_dir) {
        return CaptureOutcome::Failed(format!(
            "captured path {local_path} is outside archive root {archive_dir}"
        ));
    }

    let mut record = CaptureRecord::new(today, local_path.clone(), artifact.description.clone());
    if let Some(previous) = store.get(&artifact.identity) {
        record.extra = previous.extra.clone();
    }
    store.record_capture(artifact.identity.clone(), record);

    CaptureOutcome::Success {
        local_path,
        captured_at: today,
    }
}

/// Resolve a failed capture against the store. Takes the store by shared
/// reference: a failure can never alter what is recorded.
pub fn fall_back(store: &MetadataStore, identity: &str) -> CaptureOutcome {
    match store.get(identity) {
        Some(existing) => CaptureOutcome::FallbackUsed(existing.clone()),
        None => CaptureOutcome::Skipped(SkipReason::NoPriorArchive),
    }
}

pub fn skip_not_found() -> CaptureOutcome {
    CaptureOutcome::Skipped(SkipReason::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn success_keeps_unknown_fields_of_previous_record() {
        let archive = ArchivePath::new("archive").unwrap();
        let mut store = MetadataStore::new();
        let mut old = CaptureRecord::new(
            date(2024, 1, 1),
            ArchivePath::new("archive/x/index.html").unwrap(),
            None,
        );
        old.extra
            .insert("note".to_string(), serde_json::Value::from("kept"));
        store.record_capture("https://x", old);

        let artifact = Artifact::new("https://x");
        record_success(
            &mut store,
            &artifact,
            &archive,
            ArchivePath::new("archive/x/index.html").unwrap(),
            date(2024, 2, 1),
        );

        let record = store.get("https://x").unwrap();
        assert_eq!(record.last_captured_at, date(2024, 2, 1));
        assert_eq!(record.extra.get("note"), Some(&serde_json::Value::from("kept")));
    }

    #[test]
    fn path_outside_archive_is_rejected() {
        let archive = ArchivePath::new("archive").unwrap();
        let mut store = MetadataStore::new();
        let outcome = record_success(
            &mut store,
            &Artifact::new("https://x"),
            &archive,
            ArchivePath::new("public/x/index.html").unwrap(),
            date(2024, 2, 1),
        );
        assert!(matches!(outcome, CaptureOutcome::Failed(_)));
        assert!(store.is_empty());
    }
}
