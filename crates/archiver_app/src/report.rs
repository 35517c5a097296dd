//! Markdown report of every configured artifact and its archived copy.

use archiver_core::{Artifact, CaptureOutcome, CaptureRecord, MetadataStore, RunReport, SkipReason};
use chrono::NaiveDate;

pub struct ReportInput<'a> {
    pub update_schedule: Option<&'a str>,
    pub artifacts: &'a [Artifact],
    pub store: &'a MetadataStore,
    /// Outcomes of the run that just finished; `None` renders the stored state only.
    pub run: Option<&'a RunReport>,
    pub generated_on: NaiveDate,
}

pub fn render_report(input: &ReportInput<'_>) -> String {
    let mut out = String::from("# Web archive\n\n");
    if let Some(schedule) = input.update_schedule {
        out.push_str(&format!("Update schedule: {}\n\n", schedule.trim()));
    }
    out.push_str(&format!("Generated: {}\n\n", input.generated_on));

    if let Some(run) = input.run {
        out.push_str(&format!(
            "Last run: {} captured, {} kept from earlier runs, {} skipped, {} failed.\n\n",
            run.captured(),
            run.fallbacks(),
            run.skipped(),
            run.failed()
        ));
    }

    out.push_str("| Resource | Description | Archived copy | Captured | Status |\n");
    out.push_str("|---|---|---|---|---|\n");
    for artifact in input.artifacts {
        let record = input.store.get(&artifact.identity);
        let outcome = input.run.and_then(|run| run.outcome_for(&artifact.identity));
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(&artifact.identity),
            escape_cell(artifact.description.as_deref().unwrap_or("")),
            record.map(archive_link).unwrap_or_else(|| "-".to_string()),
            record
                .map(|r| r.last_captured_at.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status_label(record, outcome),
        ));
    }
    out
}

fn status_label(record: Option<&CaptureRecord>, outcome: Option<&CaptureOutcome>) -> String {
    match (outcome, record) {
        (Some(CaptureOutcome::Success { .. }), _) => "captured".to_string(),
        (Some(CaptureOutcome::FallbackUsed(old)), _) => {
            format!("stale: capture failed, showing {}", old.last_captured_at)
        }
        (Some(CaptureOutcome::Skipped(SkipReason::NotFound)), Some(old)) => {
            format!("not found, showing {}", old.last_captured_at)
        }
        (Some(CaptureOutcome::Skipped(SkipReason::NotFound)), None) => "not found".to_string(),
        (Some(CaptureOutcome::Skipped(SkipReason::NoPriorArchive)), _) => {
            "never archived".to_string()
        }
        (Some(CaptureOutcome::Failed(_)), Some(old)) => {
            format!("failed, showing {}", old.last_captured_at)
        }
        (Some(CaptureOutcome::Failed(_)), None) => "failed".to_string(),
        (None, Some(_)) => "archived".to_string(),
        (None, None) => "never archived".to_string(),
    }
}

fn archive_link(record: &CaptureRecord) -> String {
    let target = record.local_path.as_str().replace(' ', "%20");
    format!("[archived copy]({target})")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiver_core::{ArchivePath, ArtifactReport, ArtifactState};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(on: NaiveDate, path: &str) -> CaptureRecord {
        CaptureRecord::new(on, ArchivePath::new(path).unwrap(), None)
    }

    fn entry(identity: &str, state: ArtifactState, outcome: CaptureOutcome) -> ArtifactReport {
        ArtifactReport {
            identity: identity.to_string(),
            state,
            outcome,
        }
    }

    #[test]
    fn stale_and_fresh_rows_are_distinguishable() {
        let artifacts = vec![
            Artifact::new("https://fresh.example").with_description("a | b"),
            Artifact::new("https://stale.example"),
            Artifact::new("https://new.example"),
        ];
        let mut store = MetadataStore::new();
        store.record_capture(
            "https://fresh.example",
            record(date(2024, 6, 1), "archive/fresh.example/index.html"),
        );
        let old = record(date(2024, 1, 1), "archive/stale.example/index.html");
        store.record_capture("https://stale.example", old.clone());

        let run = RunReport {
            artifacts: vec![
                entry(
                    "https://fresh.example",
                    ArtifactState::Captured,
                    CaptureOutcome::Success {
                        local_path: ArchivePath::new("archive/fresh.example/index.html").unwrap(),
                        captured_at: date(2024, 6, 1),
                    },
                ),
                entry(
                    "https://stale.example",
                    ArtifactState::FetchFailed,
                    CaptureOutcome::FallbackUsed(old),
                ),
                entry(
                    "https://new.example",
                    ArtifactState::FetchFailed,
                    CaptureOutcome::Skipped(SkipReason::NoPriorArchive),
                ),
            ],
        };

        let markdown = render_report(&ReportInput {
            update_schedule: Some("Weekly"),
            artifacts: &artifacts,
            store: &store,
            run: Some(&run),
            generated_on: date(2024, 6, 1),
        });

        assert!(markdown.contains("Update schedule: Weekly"));
        assert!(markdown.contains(
            "| https://fresh.example | a \\| b | [archived copy](archive/fresh.example/index.html) | 2024-06-01 | captured |"
        ));
        assert!(markdown.contains(
            "| https://stale.example |  | [archived copy](archive/stale.example/index.html) | 2024-01-01 | stale: capture failed, showing 2024-01-01 |"
        ));
        assert!(markdown.contains("| https://new.example |  | - | - | never archived |"));
        assert!(markdown
            .contains("Last run: 1 captured, 1 kept from earlier runs, 1 skipped, 0 failed."));
    }

    #[test]
    fn stored_state_renders_without_a_run() {
        let artifacts = vec![Artifact::new("r/example")];
        let mut store = MetadataStore::new();
        store.record_capture(
            "r/example",
            record(date(2023, 12, 24), "archive/r/example/index.html"),
        );

        let markdown = render_report(&ReportInput {
            update_schedule: None,
            artifacts: &artifacts,
            store: &store,
            run: None,
            generated_on: date(2024, 6, 1),
        });
        assert!(!markdown.contains("Update schedule"));
        assert!(!markdown.contains("Last run"));
        assert!(markdown.contains("| 2023-12-24 | archived |"));
    }
}
