// Consistency Audit
//
// Read-only inspection of one map's persisted state. Commit and
// restore have no rollback, so partial failures can leave orphaned
// snapshots or a ledger out of step with the current document; the
// audit makes those states visible without repairing them.

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::draft::{ItemKind, MapDocument};
use crate::ledger::{Ledger, VersionRecord};
use crate::store::layout::{current_key, snapshot_key, DRAFT_KEY, LEDGER_KEY};
use crate::store::{BlobStore, Fallback, StoreError};

pub mod checks;

pub use self::checks::{
    CurrentMatchesLatest, LedgerCountsMatch, LedgerSnapshotsPresent, ReadableDocuments,
    UniqueItemIds,
};

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected after some legitimate sequences, worth knowing.
    Info,

    /// Will be papered over by self-healing or the next commit.
    Warning,

    /// History or identity is broken.
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub check: &'static str,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub map_name: String,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.findings
            .iter()
            .map(|f| f.severity)
            .max_by_key(|s| match s {
                Severity::Info => 0,
                Severity::Warning => 1,
                Severity::Critical => 2,
            })
    }
}

/// State of a storage slot as seen without healing it.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Missing,
    Malformed(String),
    Present(T),
}

impl<T> Slot<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Slot::Present(value) => Some(value),
            _ => None,
        }
    }
}

fn read_slot<S, T>(store: &S, key: &str) -> Result<Slot<T>, StoreError>
where
    S: BlobStore,
    T: Serialize + DeserializeOwned,
{
    if !store.exists(key)? {
        return Ok(Slot::Missing);
    }

    match store.load::<Option<T>>(key, None, Fallback::Strict) {
        Ok(Some(value)) => Ok(Slot::Present(value)),
        Ok(None) => Ok(Slot::Missing),
        Err(StoreError::Malformed { reason, .. }) => Ok(Slot::Malformed(reason)),
        Err(err) => Err(err),
    }
}

/// Everything the checks look at for one map.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub map_name: String,
    pub draft: Slot<MapDocument>,
    pub current: Slot<MapDocument>,
    pub ledger: Slot<Ledger>,
    pub snapshots: BTreeMap<String, Slot<MapDocument>>,
}

impl AuditContext {
    /// Read a map's state from storage. Nothing is written.
    pub fn gather<S: BlobStore>(store: &S, map_name: &str) -> Result<Self, StoreError> {
        let draft = read_slot(store, DRAFT_KEY)?;
        let current = read_slot(store, &current_key(map_name))?;
        let ledger: Slot<Ledger> = read_slot(store, LEDGER_KEY)?;

        let mut snapshots = BTreeMap::new();
        for record in Self::ledger_records(&ledger, map_name) {
            if !snapshots.contains_key(&record.snapshot_ref) {
                let slot = read_slot(store, &snapshot_key(&record.snapshot_ref))?;
                snapshots.insert(record.snapshot_ref.clone(), slot);
            }
        }

        Ok(Self {
            map_name: map_name.to_string(),
            draft,
            current,
            ledger,
            snapshots,
        })
    }

    fn ledger_records<'a>(ledger: &'a Slot<Ledger>, map_name: &str) -> &'a [VersionRecord] {
        ledger
            .present()
            .map(|l| l.records_for(map_name))
            .unwrap_or(&[])
    }

    /// This map's ledger records in append order.
    pub fn records(&self) -> &[VersionRecord] {
        Self::ledger_records(&self.ledger, &self.map_name)
    }
}

/// Ids that occur more than once in a collection.
pub(crate) fn duplicate_ids(document: &MapDocument, kind: ItemKind) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for item in document.items(kind) {
        if !seen.insert(item.id.as_str()) && !duplicates.contains(&item.id) {
            duplicates.push(item.id.clone());
        }
    }
    duplicates
}

/// A single consistency rule.
///
/// Checks must be pure: they only read the context.
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    fn inspect(&self, context: &AuditContext) -> Vec<(Severity, String)>;
}

/// Runs a set of checks and collects their findings.
#[derive(Default)]
pub struct AuditEngine {
    checks: Vec<Box<dyn Check>>,
}

impl AuditEngine {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Engine preloaded with every built-in check.
    pub fn with_default_checks() -> Self {
        let mut engine = Self::new();
        engine.register(ReadableDocuments);
        engine.register(UniqueItemIds);
        engine.register(LedgerSnapshotsPresent);
        engine.register(LedgerCountsMatch);
        engine.register(CurrentMatchesLatest);
        engine
    }

    pub fn register<C: Check + 'static>(&mut self, check: C) {
        self.checks.push(Box::new(check));
    }

    /// Evaluate every check. Unlike a gate, this never stops early.
    pub fn run(&self, context: &AuditContext) -> AuditReport {
        let findings = self
            .checks
            .iter()
            .flat_map(|check| {
                check
                    .inspect(context)
                    .into_iter()
                    .map(move |(severity, message)| Finding {
                        check: check.name(),
                        severity,
                        message,
                    })
            })
            .collect();

        AuditReport {
            map_name: context.map_name.clone(),
            findings,
        }
    }
}
