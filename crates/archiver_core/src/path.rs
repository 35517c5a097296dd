use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchivePathError {
    #[error("archive path is empty")]
    Empty,
    #[error("archive path must be relative: {0}")]
    Absolute(String),
    #[error("archive path must not be a remote url: {0}")]
    RemoteUrl(String),
    #[error("archive path must not contain parent components: {0}")]
    ParentTraversal(String),
    #[error("path {path} is not under {root}")]
    OutsideRoot { path: String, root: String },
}

/// Store-relative path to a locally archived representation.
///
/// Always `/`-separated, never absolute, never a URL and never escaping upwards.
/// Resolve it against the site root with [`ArchivePath::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArchivePath(String);

impl ArchivePath {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ArchivePathError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(ArchivePathError::Empty);
        }
        if raw.contains("://") {
            return Err(ArchivePathError::RemoteUrl(raw.to_string()));
        }
        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(ArchivePathError::Absolute(raw.to_string()));
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(ArchivePathError::ParentTraversal(raw.to_string())),
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Err(ArchivePathError::Empty);
        }
        Ok(Self(segments.join("/")))
    }

    /// Convert a filesystem path below `site_root` into its store-relative form.
    pub fn from_resolved(site_root: &Path, path: &Path) -> Result<Self, ArchivePathError> {
        let relative = path
            .strip_prefix(site_root)
            .map_err(|_| ArchivePathError::OutsideRoot {
                path: path.display().to_string(),
                root: site_root.display().to_string(),
            })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(ArchivePathError::ParentTraversal(
                        relative.display().to_string(),
                    ))
                }
            }
        }
        Self::new(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join(&self, relative: &str) -> Result<Self, ArchivePathError> {
        Self::new(format!("{}/{}", self.0, relative))
    }

    /// True when `self` lies strictly below `root`.
    pub fn is_under(&self, root: &ArchivePath) -> bool {
        self.0
            .strip_prefix(root.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn resolve(&self, site_root: &Path) -> PathBuf {
        self.0
            .split('/')
            .fold(site_root.to_path_buf(), |acc, segment| acc.join(segment))
    }
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl TryFrom<String> for ArchivePath {
    type Error = ArchivePathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArchivePath> for String {
    fn from(value: ArchivePath) -> Self {
        value.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchivePath, ArchivePathError};
    use std::path::Path;

    #[test]
    fn normalizes_separators_and_dot_segments() {
        let path = ArchivePath::new(r"./archive\example.org//index.html").unwrap();
        assert_eq!(path.as_str(), "archive/example.org/index.html");
    }

    #[test]
    fn rejects_absolute_remote_and_escaping_paths() {
        assert!(matches!(
            ArchivePath::new("/var/www/index.html"),
            Err(ArchivePathError::Absolute(_))
        ));
        assert!(matches!(
            ArchivePath::new(r"C:\archive\index.html"),
            Err(ArchivePathError::Absolute(_))
        ));
        assert!(matches!(
            ArchivePath::new("https://example.org/index.html"),
            Err(ArchivePathError::RemoteUrl(_))
        ));
        assert!(matches!(
            ArchivePath::new("archive/../secrets"),
            Err(ArchivePathError::ParentTraversal(_))
        ));
        assert_eq!(ArchivePath::new(" ./ "), Err(ArchivePathError::Empty));
    }

    #[test]
    fn host_with_port_is_not_mistaken_for_a_drive() {
        let path = ArchivePath::new("archive/localhost:8080/index.html").unwrap();
        assert_eq!(path.as_str(), "archive/localhost:8080/index.html");
    }

    #[test]
    fn is_under_requires_a_component_boundary() {
        let root = ArchivePath::new("archive").unwrap();
        assert!(ArchivePath::new("archive/x/index.html")
            .unwrap()
            .is_under(&root));
        assert!(!ArchivePath::new("archived/x/index.html")
            .unwrap()
            .is_under(&root));
        assert!(!root.is_under(&root));
    }

    #[test]
    fn resolve_and_back_is_stable() {
        let site = Path::new("/srv/site");
        let path = ArchivePath::new("archive/r/example/index.html").unwrap();
        let resolved = path.resolve(site);
        assert_eq!(ArchivePath::from_resolved(site, &resolved).unwrap(), path);
    }

    #[test]
    fn from_resolved_rejects_foreign_roots() {
        let err = ArchivePath::from_resolved(Path::new("/srv/site"), Path::new("/tmp/x.html"))
            .unwrap_err();
        assert!(matches!(err, ArchivePathError::OutsideRoot { .. }));
    }
}
