//! Archiver core: pure archive model, capture policy and per-artifact state machine.
mod artifact;
mod outcome;
mod path;
mod probe;
mod reconcile;
mod record;
mod state;
mod store;
mod strategy;

pub use artifact::Artifact;
pub use outcome::{ArtifactReport, CaptureOutcome, RunReport, SkipReason};
pub use path::{ArchivePath, ArchivePathError};
pub use probe::{ProbeFailure, ProbeStatus, ValidationPolicy, ValidationSweep};
pub use reconcile::{fall_back, record_success, skip_not_found};
pub use record::CaptureRecord;
pub use state::{advance, ArtifactState, CaptureEvent};
pub use store::{LoadedStore, MetadataStore, UnreadableEntry};
pub use strategy::{
    select_capture, ArtifactTarget, CapturePlan, CaptureStrategy, COMMUNITY_INDEX_HOST,
};
