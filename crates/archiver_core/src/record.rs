use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ArchivePath;

const DESCRIPTION: &str = "description";

/// Persisted fact: as of `last_captured_at`, the best local copy lives at `local_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct CaptureRecord {
    pub last_captured_at: NaiveDate,
    pub local_path: ArchivePath,
    pub description: Option<String>,
    /// Fields written by other tools; carried through untouched.
    pub extra: Map<String, Value>,
}

impl CaptureRecord {
    pub fn new(
        last_captured_at: NaiveDate,
        local_path: ArchivePath,
        description: Option<String>,
    ) -> Self {
        Self {
            last_captured_at,
            local_path,
            description,
            extra: Map::new(),
        }
    }
}

/// On-disk shape. `description` distinguishes a missing key (`None`) from an
/// explicit `null` (`Some(None)`).
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "lastArchived")]
    last_archived: NaiveDate,
    #[serde(rename = "archivedPath")]
    archived_path: ArchivePath,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    description: Option<Option<String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<StoredRecord> for CaptureRecord {
    fn from(stored: StoredRecord) -> Self {
        let mut extra = stored.extra;
        let description = match stored.description {
            Some(Some(text)) => Some(text),
            Some(None) => {
                extra.insert(DESCRIPTION.to_string(), Value::Null);
                None
            }
            None => None,
        };
        Self {
            last_captured_at: stored.last_archived,
            local_path: stored.archived_path,
            description,
            extra,
        }
    }
}

impl From<CaptureRecord> for StoredRecord {
    fn from(record: CaptureRecord) -> Self {
        let mut extra = record.extra;
        let explicit_null = extra.remove(DESCRIPTION).is_some();
        let description = match record.description {
            Some(text) => Some(Some(text)),
            None if explicit_null => Some(None),
            None => None,
        };
        Self {
            last_archived: record.last_captured_at,
            archived_path: record.local_path,
            description,
            extra,
        }
    }
}
