// Map Service
//
// Boundary operations for a transport layer. Every operation takes
// the service lock, so the draft, ledger, and current documents see
// one writer at a time within this process.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::audit::{AuditContext, AuditEngine, AuditReport};
use crate::config::ServiceConfig;
use crate::draft::{DraftStore, ItemKind, MapDocument};
use crate::editor::{EditError, ItemEditor};
use crate::ledger::{Ledger, VersionRecord};
use crate::snapshot::{Clock, RestoreOutcome, SnapshotEngine, SnapshotError, SystemClock};
use crate::store::layout::{current_key, LEDGER_KEY};
use crate::store::{BlobStore, Fallback, StoreError};

/// Raw view of the ledger blob, for debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerDump {
    pub exists: bool,
    pub key: &'static str,
    pub content: Ledger,
}

pub struct MapService<S: BlobStore, C: Clock = SystemClock> {
    store: Arc<S>,
    editor: ItemEditor<S>,
    engine: SnapshotEngine<S, C>,
    audits: AuditEngine,
    config: ServiceConfig,
    lock: Mutex<()>,
}

impl<S: BlobStore, C: Clock> MapService<S, C> {
    pub fn new(store: Arc<S>, clock: C, config: ServiceConfig) -> Self {
        Self {
            editor: ItemEditor::new(DraftStore::new(Arc::clone(&store))),
            engine: SnapshotEngine::new(Arc::clone(&store), clock),
            audits: AuditEngine::with_default_checks(),
            store,
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn map_name<'a>(&'a self, map_name: Option<&'a str>) -> &'a str {
        map_name.unwrap_or(&self.config.default_map)
    }

    /// Make sure the draft, the ledger, and the default map exist,
    /// healing any that are missing or damaged.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock();

        self.engine.drafts().get()?;
        self.engine.ledger().load()?;
        self.store.load(
            &current_key(&self.config.default_map),
            MapDocument::default(),
            Fallback::Heal,
        )?;

        info!(default_map = %self.config.default_map, "storage initialized");
        Ok(())
    }

    pub fn add_item(&self, kind: ItemKind, fields: Map<String, Value>) -> Result<String, EditError> {
        let _guard = self.lock.lock();
        self.editor.add(kind, fields)
    }

    pub fn update_item(
        &self,
        kind: ItemKind,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), EditError> {
        let _guard = self.lock.lock();
        self.editor.update(kind, id, fields)
    }

    pub fn delete_item(&self, kind: ItemKind, id: &str) -> Result<(), EditError> {
        let _guard = self.lock.lock();
        self.editor.delete(kind, id)
    }

    pub fn get_draft(&self) -> Result<MapDocument, StoreError> {
        let _guard = self.lock.lock();
        self.engine.drafts().get()
    }

    pub fn commit(
        &self,
        map_name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<VersionRecord, SnapshotError> {
        let _guard = self.lock.lock();
        let comment = comment.unwrap_or(&self.config.default_comment);
        self.engine.commit(self.map_name(map_name), comment)
    }

    pub fn load(&self, map_name: Option<&str>) -> Result<MapDocument, SnapshotError> {
        let _guard = self.lock.lock();
        self.engine.load(self.map_name(map_name))
    }

    /// Version records, newest first.
    pub fn history(&self, map_name: Option<&str>) -> Result<Vec<VersionRecord>, SnapshotError> {
        let _guard = self.lock.lock();
        let map_name = self.map_name(map_name);
        let records = self.engine.history(map_name)?;
        info!(map = map_name, versions = records.len(), "history listed");
        Ok(records)
    }

    pub fn restore(
        &self,
        map_name: Option<&str>,
        snapshot_ref: &str,
    ) -> Result<RestoreOutcome, SnapshotError> {
        let _guard = self.lock.lock();
        self.engine.restore(self.map_name(map_name), snapshot_ref)
    }

    /// The ledger as stored, without healing it.
    pub fn inspect_versions(&self) -> Result<LedgerDump, StoreError> {
        let _guard = self.lock.lock();
        Ok(LedgerDump {
            exists: self.store.exists(LEDGER_KEY)?,
            key: LEDGER_KEY,
            content: self.store.load(LEDGER_KEY, Ledger::new(), Fallback::Strict)?,
        })
    }

    pub fn audit(&self, map_name: Option<&str>) -> Result<AuditReport, StoreError> {
        let _guard = self.lock.lock();
        let context = AuditContext::gather(self.store.as_ref(), self.map_name(map_name))?;
        Ok(self.audits.run(&context))
    }
}
