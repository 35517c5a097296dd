use std::fmt;

use chrono::NaiveDate;

use crate::{ArchivePath, ArtifactState, CaptureRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    NoPriorArchive,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::NoPriorArchive => write!(f, "no prior archive"),
        }
    }
}

/// What a run did for one artifact. Transient; only the record it produces is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Success {
        local_path: ArchivePath,
        captured_at: NaiveDate,
    },
    /// The capture failed; the existing record stands unchanged.
    FallbackUsed(CaptureRecord),
    Skipped(SkipReason),
    /// The capture reported success but its result could not be recorded.
    Failed(String),
}

impl CaptureOutcome {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CaptureOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub identity: String,
    pub state: ArtifactState,
    pub outcome: CaptureOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub artifacts: Vec<ArtifactReport>,
}

impl RunReport {
    pub fn outcome_for(&self, identity: &str) -> Option<&CaptureOutcome> {
        self.artifacts
            .iter()
            .find(|report| report.identity == identity)
            .map(|report| &report.outcome)
    }

    pub fn captured(&self) -> usize {
        self.count(|outcome| matches!(outcome, CaptureOutcome::Success { .. }))
    }

    pub fn fallbacks(&self) -> usize {
        self.count(|outcome| matches!(outcome, CaptureOutcome::FallbackUsed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, CaptureOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, CaptureOutcome::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&CaptureOutcome) -> bool) -> usize {
        self.artifacts
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
}
