// Snapshot Engine
//
// Commits the draft into immutable snapshots, loads a map's current
// document into the draft, and restores historical snapshots while
// cutting the ledger back to the restore point.
//
// Known boundaries, kept as-is:
// - two commits of one map within the same second share a snapshot
//   reference, the later overwriting the earlier blob
// - commit and restore are step sequences without rollback; a failed
//   step leaves the steps before it applied

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::draft::{DraftStore, MapDocument};
use crate::ledger::{LedgerStore, VersionRecord};
use crate::store::layout::{current_key, snapshot_key};
use crate::store::{BlobStore, Fallback, StoreError};

pub mod clock;

pub use self::clock::{Clock, SystemClock};
use self::clock::compact_stamp;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot `{0}` not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a successful restore changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    /// Ledger records discarded after the restore point.
    pub removed: usize,

    /// Snapshot reference of the copy taken of the replaced current document.
    pub pre_restore_backup: Option<String>,
}

/// Snapshot reference for a commit of `map_name` at `stamp`.
pub fn snapshot_ref(map_name: &str, stamp: &str) -> String {
    format!("{map_name}_{stamp}")
}

/// Stateless coordinator over the draft, the ledger, and the blob store.
pub struct SnapshotEngine<S: BlobStore, C: Clock = SystemClock> {
    store: Arc<S>,
    drafts: DraftStore<S>,
    ledger: LedgerStore<S>,
    clock: C,
}

impl<S: BlobStore, C: Clock> SnapshotEngine<S, C> {
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self {
            drafts: DraftStore::new(Arc::clone(&store)),
            ledger: LedgerStore::new(Arc::clone(&store)),
            store,
            clock,
        }
    }

    /// Commit the draft as a new version of `map_name`.
    ///
    /// Order: snapshot blob, current document, ledger record. The first
    /// failing write ends the commit.
    pub fn commit(&self, map_name: &str, comment: &str) -> Result<VersionRecord, SnapshotError> {
        let draft = self.drafts.get()?;

        let now = self.clock.now();
        let reference = snapshot_ref(map_name, &compact_stamp(now));

        self.store.save(&snapshot_key(&reference), &draft)?;
        self.store.save(&current_key(map_name), &draft)?;

        let record = VersionRecord {
            timestamp: now,
            snapshot_ref: reference,
            comment: comment.to_string(),
            marker_count: draft.markers.len(),
            polygon_count: draft.polygons.len(),
        };
        self.ledger.append(map_name, record.clone())?;

        info!(
            map = map_name,
            snapshot = %record.snapshot_ref,
            markers = record.marker_count,
            polygons = record.polygon_count,
            "map committed"
        );
        Ok(record)
    }

    /// Replace the draft with the current document of `map_name`.
    ///
    /// Unsaved draft edits are discarded.
    pub fn load(&self, map_name: &str) -> Result<MapDocument, SnapshotError> {
        let document = self
            .store
            .load(&current_key(map_name), MapDocument::default(), Fallback::Heal)?;

        self.drafts.set(&document)?;

        info!(
            map = map_name,
            markers = document.markers.len(),
            polygons = document.polygons.len(),
            "map loaded into draft"
        );
        Ok(document)
    }

    /// Roll `map_name` back to the snapshot `reference`.
    ///
    /// The current document is copied aside first, then the current
    /// document and the draft are overwritten, then the ledger is cut
    /// back. A reference absent from the ledger still restores the data
    /// and leaves the history as it was.
    pub fn restore(&self, map_name: &str, reference: &str) -> Result<RestoreOutcome, SnapshotError> {
        let key = snapshot_key(reference);
        let exists = match self.store.exists(&key) {
            Ok(exists) => exists,
            Err(StoreError::InvalidKey(_)) => false,
            Err(err) => return Err(err.into()),
        };
        if !exists {
            return Err(SnapshotError::NotFound(reference.to_string()));
        }

        let snapshot = self
            .store
            .load(&key, MapDocument::default(), Fallback::Heal)?;

        let current = current_key(map_name);
        let pre_restore_backup = match self.store.read(&current)? {
            Some(bytes) => {
                let backup = format!(
                    "{}_before_restore",
                    snapshot_ref(map_name, &compact_stamp(self.clock.now()))
                );
                self.store.write(&snapshot_key(&backup), &bytes)?;
                info!(map = map_name, backup = %backup, "current document backed up before restore");
                Some(backup)
            }
            None => None,
        };

        self.store.save(&current, &snapshot)?;
        self.drafts.set(&snapshot)?;

        let removed = self.ledger.truncate_after(map_name, reference)?;
        if removed == 0 && !self.ledger.load()?.contains(map_name, reference) {
            warn!(
                map = map_name,
                snapshot = reference,
                "restored snapshot is not in the ledger, history left unchanged"
            );
        }

        info!(
            map = map_name,
            snapshot = reference,
            removed,
            markers = snapshot.markers.len(),
            polygons = snapshot.polygons.len(),
            "snapshot restored"
        );
        Ok(RestoreOutcome {
            removed,
            pre_restore_backup,
        })
    }

    /// Ledger records of `map_name`, newest first.
    pub fn history(&self, map_name: &str) -> Result<Vec<VersionRecord>, SnapshotError> {
        Ok(self.ledger.load()?.history(map_name))
    }

    pub fn drafts(&self) -> &DraftStore<S> {
        &self.drafts
    }

    pub fn ledger(&self) -> &LedgerStore<S> {
        &self.ledger
    }
}
