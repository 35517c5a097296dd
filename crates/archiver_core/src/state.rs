use crate::ProbeStatus;

/// Per-artifact lifecycle within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactState {
    #[default]
    Pending,
    Probed,
    Fetching,
    Captured,
    FetchFailed,
    NotFoundSkip,
}

impl ArtifactState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ArtifactState::Captured | ArtifactState::FetchFailed | ArtifactState::NotFoundSkip
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Probed(ProbeStatus),
    FetchStarted,
    FetchSucceeded,
    FetchFailed,
}

/// Pure transition function. Events that do not apply to the current state
/// leave it unchanged, so terminal states stay terminal.
pub fn advance(state: ArtifactState, event: &CaptureEvent) -> ArtifactState {
    match (state, event) {
        (ArtifactState::Pending, CaptureEvent::Probed(status)) => match status {
            ProbeStatus::Reachable => ArtifactState::Probed,
            ProbeStatus::NotFound => ArtifactState::NotFoundSkip,
            ProbeStatus::HardFailure(_) => ArtifactState::FetchFailed,
        },
        (ArtifactState::Probed, CaptureEvent::FetchStarted) => ArtifactState::Fetching,
        (ArtifactState::Fetching, CaptureEvent::FetchSucceeded) => ArtifactState::Captured,
        (ArtifactState::Fetching, CaptureEvent::FetchFailed) => ArtifactState::FetchFailed,
        (current, _) => current,
    }
}
