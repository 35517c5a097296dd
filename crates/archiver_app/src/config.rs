//! Run configuration read from `archiver.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use archiver_core::{ArchivePath, ArchivePathError, Artifact, ValidationPolicy};
use archiver_engine::is_valid_header_value;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "archiver.toml";
const DEFAULT_ARCHIVE_DIR: &str = "archive";
const DEFAULT_REPORT_FILE: &str = "ARCHIVE.md";
const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no artifacts configured")]
    NoArtifacts,
    #[error("artifact #{0} has an empty identity")]
    EmptyIdentity(usize),
    #[error("artifact {0:?} is configured more than once")]
    DuplicateIdentity(String),
    #[error("invalid {field}: {source}")]
    InvalidPath {
        field: &'static str,
        source: ArchivePathError,
    },
    #[error("capture.{0} cannot be sent as an HTTP header")]
    InvalidHeader(&'static str),
    #[error("publish command is empty")]
    EmptyPublishCommand,
    #[error("publishing needs a credential in ${0}, which is unset or empty")]
    MissingCredential(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    update_schedule: Option<String>,
    archive_dir: Option<String>,
    metadata_file: Option<String>,
    report_file: Option<String>,
    #[serde(default)]
    validation: ValidationPolicy,
    #[serde(default)]
    capture: CaptureConfig,
    publish: Option<PublishConfig>,
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

/// Options handed to the prober and both fetchers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub rate_limit: Option<String>,
    pub user_agent: Option<String>,
    pub contact: Option<String>,
    pub probe_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub delay_between_captures_ms: u64,
    pub mirror_binary: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            rate_limit: None,
            user_agent: Some(concat!("archiver/", env!("CARGO_PKG_VERSION")).to_string()),
            contact: None,
            probe_timeout_secs: 15,
            fetch_timeout_secs: 30 * 60,
            delay_between_captures_ms: 0,
            mirror_binary: PathBuf::from("wget"),
        }
    }
}

impl CaptureConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delay_between_captures(&self) -> Duration {
        Duration::from_millis(self.delay_between_captures_ms)
    }

    fn validate_headers(&self) -> Result<(), ConfigError> {
        let headers = [
            ("user_agent", self.user_agent.as_deref()),
            ("contact", self.contact.as_deref()),
        ];
        for (field, value) in headers {
            if value.is_some_and(|value| !is_valid_header_value(value)) {
                return Err(ConfigError::InvalidHeader(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    pub command: Vec<String>,
    pub token_env: String,
}

/// A publish step ready to run, credential included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub command: Vec<String>,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub update_schedule: Option<String>,
    pub archive_dir: ArchivePath,
    pub metadata_file: ArchivePath,
    pub report_file: ArchivePath,
    pub validation: ValidationPolicy,
    pub capture: CaptureConfig,
    pub publish: Option<PublishConfig>,
    pub artifacts: Vec<Artifact>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let archive_dir = parse_path(
            "archive_dir",
            raw.archive_dir.as_deref().unwrap_or(DEFAULT_ARCHIVE_DIR),
        )?;
        let metadata_file = match raw.metadata_file.as_deref() {
            Some(path) => parse_path("metadata_file", path)?,
            None => archive_dir
                .join(METADATA_FILE_NAME)
                .map_err(|source| ConfigError::InvalidPath {
                    field: "metadata_file",
                    source,
                })?,
        };
        let report_file = parse_path(
            "report_file",
            raw.report_file.as_deref().unwrap_or(DEFAULT_REPORT_FILE),
        )?;

        raw.capture.validate_headers()?;
        let artifacts = validate_artifacts(raw.artifacts)?;
        if let Some(publish) = &raw.publish {
            let program = publish.command.first();
            if program.map_or(true, |program| program.trim().is_empty()) {
                return Err(ConfigError::EmptyPublishCommand);
            }
        }

        Ok(Self {
            update_schedule: raw.update_schedule,
            archive_dir,
            metadata_file,
            report_file,
            validation: raw.validation,
            capture: raw.capture,
            publish: raw.publish,
            artifacts,
        })
    }

    /// Resolve the publish step and its credential. Run before any capture
    /// work so a missing credential fails the job up front.
    pub fn resolve_publish(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<PublishTarget>, ConfigError> {
        let Some(publish) = &self.publish else {
            return Ok(None);
        };
        let token = lookup(&publish.token_env)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(publish.token_env.clone()))?;
        Ok(Some(PublishTarget {
            command: publish.command.clone(),
            token,
        }))
    }
}

fn parse_path(field: &'static str, raw: &str) -> Result<ArchivePath, ConfigError> {
    ArchivePath::new(raw).map_err(|source| ConfigError::InvalidPath { field, source })
}

fn validate_artifacts(artifacts: Vec<Artifact>) -> Result<Vec<Artifact>, ConfigError> {
    if artifacts.is_empty() {
        return Err(ConfigError::NoArtifacts);
    }
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(artifacts.len());
    for (index, mut artifact) in artifacts.into_iter().enumerate() {
        let identity = artifact.identity.trim().to_string();
        if identity.is_empty() {
            return Err(ConfigError::EmptyIdentity(index + 1));
        }
        if !seen.insert(identity.clone()) {
            return Err(ConfigError::DuplicateIdentity(identity));
        }
        artifact.identity = identity;
        artifact.description = artifact
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        validated.push(artifact);
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r#"
update_schedule = "Every Monday at 06:00 UTC"
validation = "fail-fast"

[capture]
rate_limit = "200k"
contact = "ops@example.org"
fetch_timeout_secs = 120

[publish]
command = ["./publish.sh", "--quiet"]
token_env = "ARCHIVE_PUBLISH_TOKEN"

[[artifacts]]
identity = "https://example.org"
description = "home"

[[artifacts]]
identity = "r/example"
"#;

    #[test]
    fn parses_a_full_config_with_defaults() {
        let config = Config::from_toml_str(FULL).unwrap();
        assert_eq!(config.archive_dir.as_str(), "archive");
        assert_eq!(config.metadata_file.as_str(), "archive/metadata.json");
        assert_eq!(config.report_file.as_str(), "ARCHIVE.md");
        assert_eq!(config.validation, ValidationPolicy::FailFast);
        assert_eq!(config.capture.rate_limit.as_deref(), Some("200k"));
        assert_eq!(config.capture.fetch_timeout(), Duration::from_secs(120));
        assert_eq!(config.capture.probe_timeout(), Duration::from_secs(15));
        assert_eq!(
            config.artifacts,
            vec![
                Artifact::new("https://example.org").with_description("home"),
                Artifact::new("r/example"),
            ]
        );
    }

    #[test]
    fn duplicate_identities_are_rejected() {
        let text = r#"
[[artifacts]]
identity = "https://example.org"
[[artifacts]]
identity = " https://example.org "
"#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(ConfigError::DuplicateIdentity(id)) if id == "https://example.org"
        ));
    }

    #[test]
    fn empty_artifact_list_is_a_configuration_error() {
        assert!(matches!(
            Config::from_toml_str("update_schedule = \"daily\""),
            Err(ConfigError::NoArtifacts)
        ));
    }

    #[test]
    fn absolute_archive_dir_is_rejected() {
        let text = r#"
archive_dir = "/var/archive"
[[artifacts]]
identity = "https://example.org"
"#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(ConfigError::InvalidPath {
                field: "archive_dir",
                ..
            })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = r#"
archive_directory = "archive"
[[artifacts]]
identity = "https://example.org"
"#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn contact_must_be_a_valid_header_value() {
        let text = r#"
[capture]
contact = "ops@example.org\nX-Injected: 1"
[[artifacts]]
identity = "https://example.org"
"#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(ConfigError::InvalidHeader("contact"))
        ));
    }

    #[test]
    fn publish_credential_must_be_present() {
        let config = Config::from_toml_str(FULL).unwrap();
        assert!(matches!(
            config.resolve_publish(|_| None),
            Err(ConfigError::MissingCredential(env)) if env == "ARCHIVE_PUBLISH_TOKEN"
        ));
        assert!(matches!(
            config.resolve_publish(|_| Some("  ".to_string())),
            Err(ConfigError::MissingCredential(_))
        ));

        let target = config
            .resolve_publish(|name| (name == "ARCHIVE_PUBLISH_TOKEN").then(|| "secret".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(target.command, vec!["./publish.sh", "--quiet"]);
        assert_eq!(target.token, "secret");
    }

    #[test]
    fn publishing_is_optional() {
        let text = r#"
[[artifacts]]
identity = "https://example.org"
"#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.resolve_publish(|_| None).unwrap(), None);
    }
}
