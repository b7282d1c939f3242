// Filesystem Blob Store
//
// One pretty-printed JSON file per key under a root directory.
// Slashes in keys become subdirectories.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BlobStore, StoreError};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its file, refusing anything that could escape the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.contains('\\')
            && !key.starts_with('/')
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(format!("{key}.{EXTENSION}")))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl BlobStore for FsBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(key, err)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error(key, err))?;
        }
        fs::write(&path, bytes).map_err(|err| io_error(key, err))
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        path.try_exists().map_err(|err| io_error(key, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Fallback;
    use serde_json::{json, Value};

    #[test]
    fn nested_keys_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert_eq!(store.root(), dir.path());

        store.save("backups/default_20240101_120000", &json!({"markers": []})).unwrap();

        assert!(dir.path().join("backups/default_20240101_120000.json").is_file());
        assert!(store.exists("backups/default_20240101_120000").unwrap());
        assert!(!store.exists("backups/other").unwrap());
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(store.read("nothing").unwrap().is_none());
    }

    #[test]
    fn empty_file_is_healed_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("versions.json"), b"").unwrap();
        let store = FsBlobStore::new(dir.path());

        let ledger: Value = store.load("versions", json!({}), Fallback::Heal).unwrap();

        assert_eq!(ledger, json!({}));
        let on_disk = std::fs::read_to_string(dir.path().join("versions.json")).unwrap();
        assert_eq!(on_disk.trim(), "{}");
    }

    #[test]
    fn escaping_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        for key in ["", "../outside", "maps/../../x", "/etc/passwd", "a//b", "a\\b"] {
            assert!(
                matches!(store.read(key), Err(StoreError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }
}
