// In-Memory Blob Store
//
// Volatile backend used by tests and dry runs.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{BlobStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.read().contains_key(key))
    }
}
