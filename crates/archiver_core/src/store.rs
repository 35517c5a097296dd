use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::CaptureRecord;

/// Identity -> last known good capture, in insertion order.
///
/// The only mutation is [`MetadataStore::record_capture`]; records are never
/// removed. Entries that could not be read are kept verbatim and written back
/// unchanged until a capture replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataStore {
    order: Vec<String>,
    records: HashMap<String, CaptureRecord>,
    unreadable: HashMap<String, Value>,
}

/// An entry that did not form a valid record. Its raw value stays in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
    pub identity: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedStore {
    pub store: MetadataStore,
    pub unreadable: Vec<UnreadableEntry>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of usable records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&CaptureRecord> {
        self.records.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    /// Raw value of an entry that could not be read as a record.
    pub fn unreadable(&self, identity: &str) -> Option<&Value> {
        self.unreadable.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CaptureRecord)> + '_ {
        self.order.iter().filter_map(|identity| {
            self.records
                .get(identity)
                .map(|record| (identity.as_str(), record))
        })
    }

    /// Insert or replace the record for `identity`, returning the previous one.
    /// A replaced identity keeps its original position, including one whose
    /// previous entry was unreadable.
    pub fn record_capture(
        &mut self,
        identity: impl Into<String>,
        record: CaptureRecord,
    ) -> Option<CaptureRecord> {
        let identity = identity.into();
        let known = self.records.contains_key(&identity)
            || self.unreadable.remove(&identity).is_some();
        if !known {
            self.order.push(identity.clone());
        }
        self.records.insert(identity, record)
    }

    /// Parse a persisted store. Entries that do not form a valid record are
    /// reported and kept as raw values; only a document that is not a JSON
    /// object fails.
    pub fn from_json(text: &str) -> Result<LoadedStore, serde_json::Error> {
        let document: Map<String, Value> = serde_json::from_str(text)?;
        let mut loaded = LoadedStore::default();
        for (identity, value) in document {
            match serde_json::from_value::<CaptureRecord>(value.clone()) {
                Ok(record) => {
                    loaded.store.record_capture(identity, record);
                }
                Err(err) => {
                    loaded.unreadable.push(UnreadableEntry {
                        identity: identity.clone(),
                        reason: err.to_string(),
                    });
                    loaded.store.order.push(identity.clone());
                    loaded.store.unreadable.insert(identity, value);
                }
            }
        }
        Ok(loaded)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

impl Serialize for MetadataStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for identity in &self.order {
            if let Some(record) = self.records.get(identity) {
                map.serialize_entry(identity, record)?;
            } else if let Some(raw) = self.unreadable.get(identity) {
                map.serialize_entry(identity, raw)?;
            }
        }
        map.end()
    }
}
