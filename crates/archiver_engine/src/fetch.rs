use std::path::PathBuf;
use std::time::Duration;

use archiver_core::{ArchivePath, CapturePlan, CaptureStrategy};
use archiver_logging::archiver_debug;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, FROM};

use crate::mirror::WgetMirror;
use crate::persist::AtomicFileWriter;
use crate::{FailureKind, FetchError};

/// Where captures land: `site_root` holds the archive directory, the
/// metadata file and the report.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    pub site_root: PathBuf,
    pub archive_dir: ArchivePath,
}

impl ArchiveLayout {
    pub fn archive_root(&self) -> PathBuf {
        self.archive_dir.resolve(&self.site_root)
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: Option<String>,
    /// Contact address sent as the `From` header.
    pub contact: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(15),
            redirect_limit: 5,
            max_bytes: 20 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: None,
            contact: None,
        }
    }
}

/// Whether `value` can be sent as an HTTP header value (user agent, contact).
pub fn is_valid_header_value(value: &str) -> bool {
    HeaderValue::from_str(value).is_ok()
}

impl FetchSettings {
    pub(crate) fn client_builder(&self) -> Result<reqwest::ClientBuilder, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(contact) = self.contact.as_deref() {
            let value = HeaderValue::from_str(contact)
                .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
            headers.insert(FROM, value);
        }
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .default_headers(headers);
        if let Some(agent) = self.user_agent.as_deref() {
            builder = builder.user_agent(agent);
        }
        Ok(builder)
    }
}

/// Executes a capture plan against a reachable target.
#[async_trait::async_trait]
pub trait CaptureFetcher: Send + Sync {
    async fn capture(&self, plan: &CapturePlan) -> Result<ArchivePath, FetchError>;
}

/// Fetches exactly one document and stores it at the plan's destination,
/// overwriting any earlier copy.
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    settings: FetchSettings,
    layout: ArchiveLayout,
    client: reqwest::Client,
}

impl DocumentFetcher {
    pub fn new(settings: FetchSettings, layout: ArchiveLayout) -> Result<Self, FetchError> {
        let redirect_limit = settings.redirect_limit;
        let client = settings
            .client_builder()?
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            layout,
            client,
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        archiver_debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl CaptureFetcher for DocumentFetcher {
    async fn capture(&self, plan: &CapturePlan) -> Result<ArchivePath, FetchError> {
        let destination = plan
            .destination(&self.layout.archive_dir)
            .ok_or_else(|| FetchError::new(FailureKind::Destination, "no destination for target"))?;

        let bytes = self.download(&plan.target_url).await?;

        let target = destination.resolve(&self.layout.site_root);
        let (dir, filename) = match (target.parent(), target.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_string_lossy().into_owned()),
            _ => {
                return Err(FetchError::new(
                    FailureKind::Destination,
                    format!("unusable destination {destination}"),
                ))
            }
        };
        AtomicFileWriter::new(dir)
            .write(&filename, &bytes)
            .map_err(|err| FetchError::new(FailureKind::Destination, err.to_string()))?;
        Ok(destination)
    }
}

/// Dispatches each plan to the fetcher for its strategy.
pub struct StrategyFetcher {
    mirror: WgetMirror,
    document: DocumentFetcher,
}

impl StrategyFetcher {
    pub fn new(mirror: WgetMirror, document: DocumentFetcher) -> Self {
        Self { mirror, document }
    }
}

#[async_trait::async_trait]
impl CaptureFetcher for StrategyFetcher {
    async fn capture(&self, plan: &CapturePlan) -> Result<ArchivePath, FetchError> {
        match plan.strategy {
            CaptureStrategy::FullSiteMirror => self.mirror.capture(plan).await,
            CaptureStrategy::SingleDocument => self.document.capture(plan).await,
        }
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
