// Ledger Persistence
//
// The whole ledger lives in a single blob. Each operation is a
// load-modify-save cycle against that blob.

use std::sync::Arc;

use super::{Ledger, VersionRecord};
use crate::store::layout::LEDGER_KEY;
use crate::store::{BlobStore, Fallback, StoreError};

pub struct LedgerStore<S: BlobStore> {
    store: Arc<S>,
}

impl<S: BlobStore> LedgerStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load the ledger, healing a missing or damaged blob to an empty one.
    pub fn load(&self) -> Result<Ledger, StoreError> {
        self.store.load(LEDGER_KEY, Ledger::new(), Fallback::Heal)
    }

    pub fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        self.store.save(LEDGER_KEY, ledger)
    }

    pub fn records_for(&self, map_name: &str) -> Result<Vec<VersionRecord>, StoreError> {
        Ok(self.load()?.records_for(map_name).to_vec())
    }

    pub fn append(&self, map_name: &str, record: VersionRecord) -> Result<(), StoreError> {
        let mut ledger = self.load()?;
        ledger.append(map_name, record);
        self.save(&ledger)
    }

    /// Truncate after `snapshot_ref`, writing only when the ref is ledgered.
    pub fn truncate_after(&self, map_name: &str, snapshot_ref: &str) -> Result<usize, StoreError> {
        let mut ledger = self.load()?;
        if !ledger.contains(map_name, snapshot_ref) {
            return Ok(0);
        }

        let removed = ledger.truncate_after(map_name, snapshot_ref);
        self.save(&ledger)?;
        Ok(removed)
    }
}

impl<S: BlobStore> Clone for LedgerStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}
