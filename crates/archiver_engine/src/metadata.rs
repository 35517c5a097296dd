use std::fs;
use std::path::Path;

use archiver_core::MetadataStore;
use archiver_logging::{archiver_info, archiver_warn};

use crate::persist::{AtomicFileWriter, PersistError};

/// Load the metadata store. Never fails: a missing file yields an empty
/// store, an unreadable or malformed one an empty store plus a warning.
pub fn load_metadata(path: &Path) -> MetadataStore {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            archiver_info!("No metadata at {:?}; starting with an empty store", path);
            return MetadataStore::new();
        }
        Err(err) => {
            archiver_warn!("Failed to read metadata from {:?}: {}", path, err);
            return MetadataStore::new();
        }
    };

    let loaded = match MetadataStore::from_json(&content) {
        Ok(loaded) => loaded,
        Err(err) => {
            archiver_warn!("Failed to parse metadata from {:?}: {}", path, err);
            return MetadataStore::new();
        }
    };

    for entry in &loaded.unreadable {
        archiver_warn!(
            "Keeping unreadable metadata entry {:?} as is: {}",
            entry.identity,
            entry.reason
        );
    }
    archiver_info!(
        "Loaded {} metadata record(s) from {:?}",
        loaded.store.len(),
        path
    );
    loaded.store
}

/// Persist the store with an atomic temp-file-then-rename replace.
pub fn save_metadata(path: &Path, store: &MetadataStore) -> Result<(), PersistError> {
    let (dir, filename) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => (dir, name.to_string_lossy()),
        _ => {
            return Err(PersistError::OutputDir(format!(
                "metadata path {path:?} has no file name"
            )))
        }
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let content = store.to_json_pretty()?;
    AtomicFileWriter::new(dir.to_path_buf()).write(&filename, content.as_bytes())?;
    archiver_info!("Saved {} metadata record(s) to {:?}", store.len(), path);
    Ok(())
}
