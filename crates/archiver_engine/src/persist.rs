use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use archiver_logging::archiver_warn;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("another run holds the lock at {0}")]
    Locked(PathBuf),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file in
/// the same directory and renaming it over the target.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Marker file that keeps two runs from mutating the same site root.
/// Holds the owner's pid and is removed again when dropped. A lock whose
/// owner is no longer running is reclaimed.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub const FILE_NAME: &'static str = ".archiver.lock";

    pub fn acquire(dir: &Path) -> Result<Self, PersistError> {
        ensure_output_dir(dir)?;
        let path = dir.join(Self::FILE_NAME);
        match Self::create(&path) {
            Err(PersistError::Locked(_)) => match holder_pid(&path) {
                Some(pid) if !is_process_running(pid) => {
                    archiver_warn!("Removing stale run lock {:?} left by pid {}", path, pid);
                    fs::remove_file(&path)?;
                    Self::create(&path)
                }
                _ => Err(PersistError::Locked(path)),
            },
            result => result,
        }
    }

    fn create(path: &Path) -> Result<Self, PersistError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(PersistError::Locked(path.to_path_buf()));
            }
            Err(err) => return Err(PersistError::Io(err)),
        };
        // Owned from here on, so a failed write still removes the file.
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        Ok(lock)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            archiver_warn!("Failed to remove run lock {:?}: {}", self.path, err);
        }
    }
}

/// Pid recorded in an existing lock; `None` while it is unreadable or still
/// being written.
fn holder_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks for existence; EPERM means it exists under another user.
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}
