use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable,
    /// The resource is gone. Expected and never fatal.
    NotFound,
    HardFailure(ProbeFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    HttpStatus(u16),
    Timeout,
    Connect(String),
    InvalidUrl(String),
    MalformedResponse(String),
}

impl ProbeStatus {
    pub fn from_http_status(code: u16) -> Self {
        match code {
            200..=399 => ProbeStatus::Reachable,
            404 => ProbeStatus::NotFound,
            other => ProbeStatus::HardFailure(ProbeFailure::HttpStatus(other)),
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ProbeFailure::Timeout => write!(f, "timeout"),
            ProbeFailure::Connect(message) => write!(f, "connection failed: {message}"),
            ProbeFailure::InvalidUrl(message) => write!(f, "invalid url: {message}"),
            ProbeFailure::MalformedResponse(message) => {
                write!(f, "malformed response: {message}")
            }
        }
    }
}

/// How the upfront reachability sweep treats hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationPolicy {
    /// No upfront sweep; every artifact is probed right before its capture.
    #[default]
    Disabled,
    /// Any hard failure in the sweep aborts the run before capture work starts.
    FailFast,
    /// Hard failures are logged and those artifacts fall back to their records.
    WarnOnly,
}

/// Result of probing every artifact before any capture begins, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationSweep {
    pub results: Vec<(String, ProbeStatus)>,
}

impl ValidationSweep {
    pub fn status_of(&self, identity: &str) -> Option<&ProbeStatus> {
        self.results
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, status)| status)
    }

    pub fn hard_failures(&self) -> Vec<(String, ProbeFailure)> {
        self.results
            .iter()
            .filter_map(|(identity, status)| match status {
                ProbeStatus::HardFailure(failure) => Some((identity.clone(), failure.clone())),
                _ => None,
            })
            .collect()
    }
}
