//! Archiver engine: probing, capture execution, persistence and the run orchestrator.
mod archiver;
mod fetch;
mod metadata;
mod mirror;
mod persist;
mod probe;
mod types;

pub use archiver::{Archiver, ArchiverConfig, Clock, RunError};
pub use fetch::{
    is_valid_header_value, ArchiveLayout, CaptureFetcher, DocumentFetcher, FetchSettings,
    StrategyFetcher,
};
pub use metadata::{load_metadata, save_metadata};
pub use mirror::{remove_backup_files, MirrorSettings, WgetMirror};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError, RunLock};
pub use probe::{Prober, ReqwestProber};
pub use types::{FailureKind, FetchError};
