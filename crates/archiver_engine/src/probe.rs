use archiver_core::{ProbeFailure, ProbeStatus};

use crate::{FetchError, FetchSettings};

/// Lightweight existence check run before the expensive capture.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeStatus;
}

/// Issues a `HEAD` request without following redirects; a 3xx already
/// proves the resource is served.
#[derive(Debug, Clone)]
pub struct ReqwestProber {
    client: reqwest::Client,
}

impl ReqwestProber {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = settings
            .client_builder()?
            .timeout(settings.probe_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(crate::fetch::map_reqwest_error)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for ReqwestProber {
    async fn probe(&self, url: &str) -> ProbeStatus {
        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                return ProbeStatus::HardFailure(ProbeFailure::InvalidUrl(err.to_string()));
            }
        };

        match self.client.head(parsed).send().await {
            Ok(response) => ProbeStatus::from_http_status(response.status().as_u16()),
            Err(err) => ProbeStatus::HardFailure(classify_error(&err)),
        }
    }
}

fn classify_error(err: &reqwest::Error) -> ProbeFailure {
    if err.is_timeout() {
        ProbeFailure::Timeout
    } else if err.is_builder() {
        ProbeFailure::InvalidUrl(err.to_string())
    } else if err.is_connect() {
        ProbeFailure::Connect(err.to_string())
    } else {
        ProbeFailure::MalformedResponse(err.to_string())
    }
}
