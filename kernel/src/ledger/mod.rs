// Version Ledger
//
// Per-map, append-ordered history of commit metadata. Records are
// immutable; the only removal is truncation back to a restore point.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod store;

pub use self::store::LedgerStore;

/// Metadata for one committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub timestamp: NaiveDateTime,
    pub snapshot_ref: String,
    pub comment: String,
    pub marker_count: usize,
    pub polygon_count: usize,
}

/// Every map's history, keyed by map name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    maps: BTreeMap<String, Vec<VersionRecord>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records for a map in append order; empty for unknown maps.
    pub fn records_for(&self, map_name: &str) -> &[VersionRecord] {
        self.maps.get(map_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn append(&mut self, map_name: &str, record: VersionRecord) {
        self.maps
            .entry(map_name.to_string())
            .or_default()
            .push(record);
    }

    /// Drop every record after the first one referencing `snapshot_ref`.
    ///
    /// Returns how many records were dropped. An unknown map or ref
    /// leaves the ledger untouched and returns 0.
    pub fn truncate_after(&mut self, map_name: &str, snapshot_ref: &str) -> usize {
        let Some(records) = self.maps.get_mut(map_name) else {
            return 0;
        };

        match records.iter().position(|r| r.snapshot_ref == snapshot_ref) {
            Some(index) => {
                let removed = records.len() - index - 1;
                records.truncate(index + 1);
                removed
            }
            None => 0,
        }
    }

    /// Whether any record of the map references `snapshot_ref`.
    pub fn contains(&self, map_name: &str, snapshot_ref: &str) -> bool {
        self.records_for(map_name)
            .iter()
            .any(|r| r.snapshot_ref == snapshot_ref)
    }

    /// Records for a map, newest first.
    ///
    /// Records sharing a timestamp keep the later-appended one first.
    pub fn history(&self, map_name: &str) -> Vec<VersionRecord> {
        let mut records: Vec<_> = self.records_for(map_name).iter().rev().cloned().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    /// Names of every map with a history, sorted.
    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }
}
