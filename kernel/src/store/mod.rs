// Blob Storage Abstraction
//
// Key -> JSON document persistence shared by the draft, the ledger,
// and the snapshot engine. Backends only move bytes; the JSON layer
// and the self-healing fallback policy live on the trait itself.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub mod fs;
pub mod layout;
pub mod memory;

pub use self::fs::FsBlobStore;
pub use self::memory::MemoryBlobStore;

/// Errors surfaced by a blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o failure on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document in `{key}`: {reason}")]
    Malformed { key: String, reason: String },

    #[error("cannot encode document for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

/// What `load` does when a slot is missing, empty, or unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Replace the slot with the default, persist it, and return it.
    Heal,

    /// Never write. A missing slot yields the default, a damaged one
    /// yields `StoreError::Malformed`.
    Strict,
}

/// Storage backend for JSON documents addressed by string keys.
///
/// Implementations MUST:
/// - treat keys as opaque apart from validation
/// - replace the whole slot on `write`
/// - report a missing slot as `Ok(None)`, not as an error
pub trait BlobStore: Send + Sync {
    /// Raw contents of a slot, or `None` if it does not exist.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite a slot.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Load and decode a document, applying `fallback` to damaged slots.
    ///
    /// Read and write failures are always returned; only a missing,
    /// empty, or undecodable slot is subject to the fallback.
    fn load<T>(&self, key: &str, default: T, fallback: Fallback) -> Result<T, StoreError>
    where
        Self: Sized,
        T: Serialize + DeserializeOwned,
    {
        let bytes = match self.read(key)? {
            Some(bytes) => bytes,
            None => {
                if fallback == Fallback::Heal {
                    warn!(key, "document does not exist, creating it");
                    self.save(key, &default)?;
                }
                return Ok(default);
            }
        };

        let reason = if bytes.iter().all(u8::is_ascii_whitespace) {
            "document is empty".to_string()
        } else {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(document) => return Ok(document),
                Err(err) => err.to_string(),
            }
        };

        match fallback {
            Fallback::Heal => {
                warn!(key, %reason, "malformed document replaced with default");
                self.save(key, &default)?;
                Ok(default)
            }
            Fallback::Strict => Err(StoreError::Malformed {
                key: key.to_string(),
                reason,
            }),
        }
    }

    /// Encode a document as pretty JSON and overwrite the slot.
    fn save<T>(&self, key: &str, document: &T) -> Result<(), StoreError>
    where
        Self: Sized,
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.write(key, &bytes)
    }
}

impl<S: BlobStore + ?Sized> BlobStore for std::sync::Arc<S> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).write(key, bytes)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn heal_creates_missing_document() {
        let store = MemoryBlobStore::new();

        let loaded: Value = store.load("doc", json!({"a": 1}), Fallback::Heal).unwrap();

        assert_eq!(loaded, json!({"a": 1}));
        assert!(store.exists("doc").unwrap());
    }

    #[test]
    fn heal_replaces_empty_and_corrupt_documents() {
        let store = MemoryBlobStore::new();
        store.write("empty", b"  \n").unwrap();
        store.write("corrupt", b"{not json").unwrap();

        let empty: Value = store.load("empty", json!([]), Fallback::Heal).unwrap();
        let corrupt: Value = store.load("corrupt", json!([]), Fallback::Heal).unwrap();

        assert_eq!(empty, json!([]));
        assert_eq!(corrupt, json!([]));
        assert_eq!(store.read("corrupt").unwrap().unwrap(), b"[]".to_vec());
    }

    #[test]
    fn strict_reports_corruption_without_writing() {
        let store = MemoryBlobStore::new();
        store.write("corrupt", b"{not json").unwrap();

        let err = store
            .load::<Value>("corrupt", json!([]), Fallback::Strict)
            .unwrap_err();

        assert!(matches!(err, StoreError::Malformed { .. }));
        assert_eq!(store.read("corrupt").unwrap().unwrap(), b"{not json".to_vec());

        let missing: Value = store.load("missing", json!(0), Fallback::Strict).unwrap();
        assert_eq!(missing, json!(0));
        assert!(!store.exists("missing").unwrap());
    }

    #[test]
    fn save_keeps_non_ascii_text() {
        let store = MemoryBlobStore::new();
        store.save("doc", &json!({"comment": "Без коментаря"})).unwrap();

        let raw = String::from_utf8(store.read("doc").unwrap().unwrap()).unwrap();
        assert!(raw.contains("Без коментаря"));
    }
}
