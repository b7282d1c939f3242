// Persisted State Layout
//
// Where each logical document lives in the blob store.

/// The live working draft.
pub const DRAFT_KEY: &str = "temp_changes";

/// The whole version ledger, every map in one document.
pub const LEDGER_KEY: &str = "versions";

/// The current document of a named map.
pub fn current_key(map_name: &str) -> String {
    format!("maps/{map_name}")
}

/// An immutable snapshot or pre-restore backup.
pub fn snapshot_key(snapshot_ref: &str) -> String {
    format!("backups/{snapshot_ref}")
}
