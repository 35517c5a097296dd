use std::sync::Arc;
use std::time::Duration;

use archiver_core::{
    advance, fall_back, record_success, select_capture, skip_not_found, ArchivePath, Artifact,
    ArtifactReport, ArtifactState, CaptureEvent, CaptureOutcome, MetadataStore, ProbeFailure,
    ProbeStatus, RunReport, ValidationPolicy, ValidationSweep,
};
use archiver_logging::{archiver_error, archiver_info, archiver_warn};
use chrono::NaiveDate;
use thiserror::Error;

use crate::fetch::CaptureFetcher;
use crate::probe::Prober;

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct ArchiverConfig {
    pub archive_dir: ArchivePath,
    pub validation: ValidationPolicy,
    pub delay_between_captures: Duration,
    /// Date stamped on new records; injected so runs are reproducible.
    pub today: Clock,
}

impl ArchiverConfig {
    pub fn new(archive_dir: ArchivePath) -> Self {
        Self {
            archive_dir,
            validation: ValidationPolicy::Disabled,
            delay_between_captures: Duration::ZERO,
            today: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("pre-validation failed for {}", describe_failures(.failures))]
    PreValidationFailed {
        failures: Vec<(String, ProbeFailure)>,
    },
}

fn describe_failures(failures: &[(String, ProbeFailure)]) -> String {
    failures
        .iter()
        .map(|(identity, failure)| format!("{identity} ({failure})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drives every artifact through probe, capture and reconciliation with the store.
pub struct Archiver {
    config: ArchiverConfig,
    prober: Arc<dyn Prober>,
    fetcher: Arc<dyn CaptureFetcher>,
}

impl Archiver {
    pub fn new(
        config: ArchiverConfig,
        prober: Arc<dyn Prober>,
        fetcher: Arc<dyn CaptureFetcher>,
    ) -> Self {
        Self {
            config,
            prober,
            fetcher,
        }
    }

    /// Probe every artifact without capturing anything.
    pub async fn validate(&self, artifacts: &[Artifact]) -> ValidationSweep {
        let mut sweep = ValidationSweep::default();
        for artifact in artifacts {
            let plan = select_capture(&artifact.identity);
            let status = self.prober.probe(&plan.target_url).await;
            match &status {
                ProbeStatus::Reachable => {}
                ProbeStatus::NotFound => {
                    archiver_warn!("Pre-validation: {} was not found", artifact.identity)
                }
                ProbeStatus::HardFailure(failure) => {
                    archiver_error!("Pre-validation: {} failed: {}", artifact.identity, failure)
                }
            }
            sweep.results.push((artifact.identity.clone(), status));
        }
        sweep
    }

    /// Process all artifacts sequentially in input order.
    ///
    /// Only a fail-fast pre-validation can abort, and it does so before any
    /// destination or `store` is touched.
    pub async fn run(
        &self,
        artifacts: &[Artifact],
        store: &mut MetadataStore,
    ) -> Result<RunReport, RunError> {
        let today = (self.config.today)();

        let sweep = match self.config.validation {
            ValidationPolicy::Disabled => None,
            policy => {
                let sweep = self.validate(artifacts).await;
                let failures = sweep.hard_failures();
                if policy == ValidationPolicy::FailFast && !failures.is_empty() {
                    return Err(RunError::PreValidationFailed { failures });
                }
                Some(sweep)
            }
        };

        let mut report = RunReport::default();
        for (index, artifact) in artifacts.iter().enumerate() {
            if index > 0 && !self.config.delay_between_captures.is_zero() {
                tokio::time::sleep(self.config.delay_between_captures).await;
            }
            let known = sweep
                .as_ref()
                .and_then(|sweep| sweep.status_of(&artifact.identity))
                .cloned();
            let entry = self.capture_artifact(artifact, known, store, today).await;
            report.artifacts.push(entry);
        }

        archiver_info!(
            "Run finished: {} captured, {} fallback, {} skipped, {} failed",
            report.captured(),
            report.fallbacks(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    async fn capture_artifact(
        &self,
        artifact: &Artifact,
        known_status: Option<ProbeStatus>,
        store: &mut MetadataStore,
        today: NaiveDate,
    ) -> ArtifactReport {
        let identity = artifact.identity.as_str();
        let plan = select_capture(identity);
        let status = match known_status {
            Some(status) => status,
            None => self.prober.probe(&plan.target_url).await,
        };

        let mut state = advance(ArtifactState::Pending, &CaptureEvent::Probed(status.clone()));
        let outcome = match state {
            ArtifactState::NotFoundSkip => {
                archiver_info!("{} not found at {}; skipping", identity, plan.target_url);
                skip_not_found()
            }
            ArtifactState::FetchFailed => {
                if let ProbeStatus::HardFailure(failure) = &status {
                    archiver_warn!("Probe of {} failed: {}", identity, failure);
                }
                fall_back(store, identity)
            }
            _ => {
                state = advance(state, &CaptureEvent::FetchStarted);
                match self.fetcher.capture(&plan).await {
                    Ok(local_path) => {
                        let outcome = record_success(
                            store,
                            artifact,
                            &self.config.archive_dir,
                            local_path,
                            today,
                        );
                        let event = if outcome.is_fresh() {
                            CaptureEvent::FetchSucceeded
                        } else {
                            CaptureEvent::FetchFailed
                        };
                        state = advance(state, &event);
                        outcome
                    }
                    Err(err) => {
                        archiver_warn!("Capture of {} failed: {}", identity, err);
                        state = advance(state, &CaptureEvent::FetchFailed);
                        fall_back(store, identity)
                    }
                }
            }
        };

        debug_assert!(state.is_terminal(), "{identity} stopped in {state:?}");
        log_outcome(identity, &outcome);
        ArtifactReport {
            identity: identity.to_string(),
            state,
            outcome,
        }
    }
}

fn log_outcome(identity: &str, outcome: &CaptureOutcome) {
    match outcome {
        CaptureOutcome::Success { local_path, .. } => {
            archiver_info!("Captured {} -> {}", identity, local_path)
        }
        CaptureOutcome::FallbackUsed(record) => archiver_warn!(
            "Keeping archive of {} from {} at {}",
            identity,
            record.last_captured_at,
            record.local_path
        ),
        CaptureOutcome::Skipped(reason) => archiver_warn!("Skipped {}: {}", identity, reason),
        CaptureOutcome::Failed(reason) => archiver_error!("Failed {}: {}", identity, reason),
    }
}
