use url::Url;

use crate::ArchivePath;

/// Host serving the canonical index page for community references.
pub const COMMUNITY_INDEX_HOST: &str = "old.reddit.com";

const COMMUNITY_NAME_MIN: usize = 2;
const COMMUNITY_NAME_MAX: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    /// Recursive same-origin mirror with page requisites and local link rewriting.
    FullSiteMirror,
    /// Exactly one document, no link following.
    SingleDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactTarget {
    DirectUrl { url: String },
    CommunityReference { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePlan {
    pub identity: String,
    pub target: ArtifactTarget,
    pub target_url: String,
    pub strategy: CaptureStrategy,
}

/// Classify an artifact identity and choose how to capture it.
///
/// Pure and infallible: anything that is not a community reference is handed
/// on as a direct URL and left to fail at probing if it is malformed.
pub fn select_capture(identity: &str) -> CapturePlan {
    let trimmed = identity.trim();
    match community_name(trimmed) {
        Some(name) => CapturePlan {
            identity: identity.to_string(),
            target_url: format!("https://{COMMUNITY_INDEX_HOST}/r/{name}/wiki/index"),
            target: ArtifactTarget::CommunityReference {
                name: name.to_string(),
            },
            strategy: CaptureStrategy::SingleDocument,
        },
        None => CapturePlan {
            identity: identity.to_string(),
            target_url: trimmed.to_string(),
            target: ArtifactTarget::DirectUrl {
                url: trimmed.to_string(),
            },
            strategy: CaptureStrategy::FullSiteMirror,
        },
    }
}

fn community_name(identity: &str) -> Option<&str> {
    let rest = identity.strip_prefix('/').unwrap_or(identity);
    let rest = rest.strip_prefix("r/")?;
    let name = rest.strip_suffix('/').unwrap_or(rest);
    let valid_len = (COMMUNITY_NAME_MIN..=COMMUNITY_NAME_MAX).contains(&name.len());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    (valid_len && valid_chars).then_some(name)
}

impl CapturePlan {
    /// Directory that holds everything this plan writes, e.g. `archive/example.org`.
    pub fn destination_dir(&self, archive_dir: &ArchivePath) -> Option<ArchivePath> {
        match &self.target {
            ArtifactTarget::CommunityReference { name } => {
                archive_dir.join(&format!("r/{name}")).ok()
            }
            ArtifactTarget::DirectUrl { url } => {
                let parsed = Url::parse(url).ok()?;
                archive_dir.join(&authority(&parsed)?).ok()
            }
        }
    }

    /// The entry document a successful capture leaves behind.
    pub fn destination(&self, archive_dir: &ArchivePath) -> Option<ArchivePath> {
        let dir = self.destination_dir(archive_dir)?;
        match &self.target {
            ArtifactTarget::CommunityReference { .. } => dir.join("index.html").ok(),
            ArtifactTarget::DirectUrl { url } => {
                let parsed = Url::parse(url).ok()?;
                dir.join(&mirrored_document(parsed.path(), true)).ok()
            }
        }
    }

    /// Entry document path as stored without extension adjustment, for
    /// resources the mirror tool keeps under their original name.
    pub fn unadjusted_destination(&self, archive_dir: &ArchivePath) -> Option<ArchivePath> {
        match &self.target {
            ArtifactTarget::CommunityReference { .. } => None,
            ArtifactTarget::DirectUrl { url } => {
                let parsed = Url::parse(url).ok()?;
                let dir = self.destination_dir(archive_dir)?;
                dir.join(&mirrored_document(parsed.path(), false)).ok()
            }
        }
    }
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn mirrored_document(url_path: &str, adjust_extension: bool) -> String {
    let mut relative = url_path.trim_start_matches('/').to_string();
    if relative.is_empty() || relative.ends_with('/') {
        relative.push_str("index.html");
        return relative;
    }
    if adjust_extension {
        let last = relative.rsplit('/').next().unwrap_or_default();
        let is_html = last.rsplit_once('.').is_some_and(|(_, ext)| {
            ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm")
        });
        if !is_html {
            relative.push_str(".html");
        }
    }
    relative
}
