use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use archiver_core::{ArchivePath, CapturePlan};
use archiver_logging::{archiver_debug, archiver_info, archiver_warn};
use tokio::process::Command;

use crate::fetch::ArchiveLayout;
use crate::persist::ensure_output_dir;
use crate::{FailureKind, FetchError};

/// wget's exit status for "the server issued an error response", which a
/// mirror hits whenever a single page requisite is broken.
const WGET_SERVER_ERROR: i32 = 8;
const BACKUP_SUFFIX: &str = ".orig";
const STDERR_TAIL: usize = 600;

#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub binary: PathBuf,
    pub timeout: Duration,
    /// Passed through to `--limit-rate`, e.g. `200k`.
    pub rate_limit: Option<String>,
    pub user_agent: Option<String>,
    pub contact: Option<String>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("wget"),
            timeout: Duration::from_secs(30 * 60),
            rate_limit: None,
            user_agent: None,
            contact: None,
        }
    }
}

/// Full-site mirror through an external `wget`.
#[derive(Debug, Clone)]
pub struct WgetMirror {
    settings: MirrorSettings,
    layout: ArchiveLayout,
}

impl WgetMirror {
    pub fn new(settings: MirrorSettings, layout: ArchiveLayout) -> Self {
        Self { settings, layout }
    }

    pub fn arguments(&self, target_url: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--mirror",
            "--convert-links",
            "--adjust-extension",
            "--page-requisites",
            "--no-parent",
            "--backup-converted",
            "--no-verbose",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();

        // The tool runs inside the site root.
        args.push(format!("--directory-prefix={}", self.layout.archive_dir));
        if let Some(rate) = self.settings.rate_limit.as_deref() {
            args.push(format!("--limit-rate={rate}"));
        }
        if let Some(agent) = self.settings.user_agent.as_deref() {
            args.push(format!("--user-agent={agent}"));
        }
        if let Some(contact) = self.settings.contact.as_deref() {
            args.push(format!("--header=From: {contact}"));
        }
        args.push(target_url.to_string());
        args
    }

    pub async fn capture(&self, plan: &CapturePlan) -> Result<ArchivePath, FetchError> {
        let archive_dir = &self.layout.archive_dir;
        let (destination, host_dir) = match (
            plan.destination(archive_dir),
            plan.destination_dir(archive_dir),
        ) {
            (Some(destination), Some(host_dir)) => (destination, host_dir),
            _ => {
                return Err(FetchError::new(
                    FailureKind::InvalidUrl,
                    format!("cannot derive a mirror destination for {}", plan.target_url),
                ))
            }
        };

        ensure_output_dir(&self.layout.archive_root())
            .map_err(|err| FetchError::new(FailureKind::Destination, err.to_string()))?;

        let candidates = self.entry_candidates(plan, &destination);
        let stamps_before: Vec<_> = candidates.iter().map(|path| self.modified(path)).collect();

        let args = self.arguments(&plan.target_url);
        archiver_info!(
            "Mirroring {} with {:?}",
            plan.target_url,
            self.settings.binary
        );
        archiver_debug!("Mirror arguments: {:?}", args);

        let child = Command::new(&self.settings.binary)
            .args(&args)
            .current_dir(&self.layout.site_root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                FetchError::new(
                    FailureKind::ToolSpawn,
                    format!("{:?}: {}", self.settings.binary, err),
                )
            })?;

        let output = tokio::time::timeout(self.settings.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                FetchError::new(
                    FailureKind::Timeout,
                    format!("mirror exceeded {:?}", self.settings.timeout),
                )
            })?
            .map_err(|err| FetchError::new(FailureKind::ToolSpawn, err.to_string()))?;

        let entry = match output.status.code() {
            Some(0) => candidates
                .iter()
                .find(|path| path.resolve(&self.layout.site_root).is_file())
                .cloned(),
            // A partial mirror counts only if this run wrote the entry document;
            // an older copy left in place is not a capture.
            Some(WGET_SERVER_ERROR) => match self.written_entry(&candidates, &stamps_before) {
                Some(written) => {
                    archiver_warn!(
                        "Mirror of {} completed with server errors on some resources",
                        plan.target_url
                    );
                    Some(written)
                }
                None => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(FetchError::new(
                        FailureKind::ToolExit(Some(WGET_SERVER_ERROR)),
                        stderr_tail(&stderr),
                    ));
                }
            },
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(FetchError::new(
                    FailureKind::ToolExit(code),
                    stderr_tail(&stderr),
                ));
            }
        };

        let host_root = host_dir.resolve(&self.layout.site_root);
        match remove_backup_files(&host_root) {
            Ok(0) => {}
            Ok(removed) => {
                archiver_debug!("Removed {} backup file(s) under {:?}", removed, host_root)
            }
            Err(err) => archiver_warn!("Failed to clean backups under {:?}: {}", host_root, err),
        }

        entry.ok_or_else(|| {
            FetchError::new(
                FailureKind::Destination,
                format!("mirror finished but {destination} is missing"),
            )
        })
    }

    /// Where the entry document may land: the adjusted name first, then the
    /// name the tool keeps when it does not add an extension.
    fn entry_candidates(
        &self,
        plan: &CapturePlan,
        destination: &ArchivePath,
    ) -> Vec<ArchivePath> {
        let mut candidates = vec![destination.clone()];
        if let Some(raw) = plan.unadjusted_destination(&self.layout.archive_dir) {
            if raw != *destination {
                candidates.push(raw);
            }
        }
        candidates
    }

    /// First candidate created or modified since `before` was taken.
    fn written_entry(
        &self,
        candidates: &[ArchivePath],
        before: &[Option<SystemTime>],
    ) -> Option<ArchivePath> {
        candidates
            .iter()
            .zip(before)
            .find(|(path, stamp)| {
                let now = self.modified(path);
                now.is_some() && now != **stamp
            })
            .map(|(path, _)| path.clone())
    }

    fn modified(&self, path: &ArchivePath) -> Option<SystemTime> {
        let metadata = fs::metadata(path.resolve(&self.layout.site_root)).ok()?;
        if !metadata.is_file() {
            return None;
        }
        metadata.modified().ok()
    }
}

/// Recursively delete the `*.orig` files left behind by link conversion.
pub fn remove_backup_files(dir: &Path) -> io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            removed += remove_backup_files(&path)?;
        } else if file_type.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(BACKUP_SUFFIX))
        {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
