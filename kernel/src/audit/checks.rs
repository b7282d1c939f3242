// Built-in Audit Checks

use super::{duplicate_ids, AuditContext, Check, Severity, Slot};
use crate::draft::ItemKind;

const KINDS: [ItemKind; 2] = [ItemKind::Marker, ItemKind::Polygon];

/// Flags slots that exist but would be healed on next access.
pub struct ReadableDocuments;

impl Check for ReadableDocuments {
    fn name(&self) -> &'static str {
        "readable-documents"
    }

    fn inspect(&self, context: &AuditContext) -> Vec<(Severity, String)> {
        let slots = [
            ("draft", malformed_reason(&context.draft)),
            ("current document", malformed_reason(&context.current)),
            ("ledger", malformed_reason(&context.ledger)),
        ];

        slots
            .into_iter()
            .filter_map(|(what, reason)| {
                reason.map(|reason| {
                    (
                        Severity::Warning,
                        format!("{what} is malformed and will be reset: {reason}"),
                    )
                })
            })
            .collect()
    }
}

fn malformed_reason<T>(slot: &Slot<T>) -> Option<&str> {
    match slot {
        Slot::Malformed(reason) => Some(reason),
        _ => None,
    }
}

/// Item ids must be unique per collection.
pub struct UniqueItemIds;

impl Check for UniqueItemIds {
    fn name(&self) -> &'static str {
        "unique-item-ids"
    }

    fn inspect(&self, context: &AuditContext) -> Vec<(Severity, String)> {
        let documents = [("draft", &context.draft), ("current document", &context.current)];

        let mut findings = Vec::new();
        for (what, slot) in documents {
            let Some(document) = slot.present() else {
                continue;
            };
            for kind in KINDS {
                for id in duplicate_ids(document, kind) {
                    findings.push((
                        Severity::Critical,
                        format!("{what} holds {kind} id `{id}` more than once"),
                    ));
                }
            }
        }
        findings
    }
}

/// Every ledgered snapshot must still be readable.
pub struct LedgerSnapshotsPresent;

impl Check for LedgerSnapshotsPresent {
    fn name(&self) -> &'static str {
        "ledger-snapshots-present"
    }

    fn inspect(&self, context: &AuditContext) -> Vec<(Severity, String)> {
        context
            .snapshots
            .iter()
            .filter_map(|(reference, slot)| match slot {
                Slot::Missing => Some((
                    Severity::Critical,
                    format!("snapshot `{reference}` is in the ledger but not in storage"),
                )),
                Slot::Malformed(reason) => Some((
                    Severity::Critical,
                    format!("snapshot `{reference}` cannot be read: {reason}"),
                )),
                Slot::Present(_) => None,
            })
            .collect()
    }
}

/// Ledger counts must describe the snapshot they point at.
///
/// Same-second commits overwrite each other's snapshot, which shows up
/// here as a count mismatch on the earlier record.
pub struct LedgerCountsMatch;

impl Check for LedgerCountsMatch {
    fn name(&self) -> &'static str {
        "ledger-counts-match"
    }

    fn inspect(&self, context: &AuditContext) -> Vec<(Severity, String)> {
        context
            .records()
            .iter()
            .filter_map(|record| {
                let snapshot = context.snapshots.get(&record.snapshot_ref)?.present()?;
                let actual = (snapshot.markers.len(), snapshot.polygons.len());
                let recorded = (record.marker_count, record.polygon_count);
                (actual != recorded).then(|| {
                    (
                        Severity::Warning,
                        format!(
                            "record `{}` claims {} markers and {} polygons, snapshot holds {} and {}",
                            record.snapshot_ref, recorded.0, recorded.1, actual.0, actual.1
                        ),
                    )
                })
            })
            .collect()
    }
}

/// The current document normally equals the newest ledgered snapshot.
///
/// Restoring a snapshot that was never ledgered, or a commit whose
/// ledger write failed, legitimately breaks this.
pub struct CurrentMatchesLatest;

impl Check for CurrentMatchesLatest {
    fn name(&self) -> &'static str {
        "current-matches-latest"
    }

    fn inspect(&self, context: &AuditContext) -> Vec<(Severity, String)> {
        let Some(latest) = context.records().last() else {
            return Vec::new();
        };
        let Some(snapshot) = context
            .snapshots
            .get(&latest.snapshot_ref)
            .and_then(Slot::present)
        else {
            return Vec::new();
        };

        match context.current.present() {
            Some(current) if current == snapshot => Vec::new(),
            Some(_) => vec![(
                Severity::Info,
                format!(
                    "current document differs from latest snapshot `{}`",
                    latest.snapshot_ref
                ),
            )],
            None => vec![(
                Severity::Info,
                format!(
                    "no readable current document although `{}` is ledgered",
                    latest.snapshot_ref
                ),
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{Item, MapDocument};
    use crate::ledger::{Ledger, VersionRecord};
    use chrono::NaiveDate;
    use serde_json::Map;
    use std::collections::BTreeMap;

    fn record(reference: &str, markers: usize) -> VersionRecord {
        VersionRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            snapshot_ref: reference.into(),
            comment: String::new(),
            marker_count: markers,
            polygon_count: 0,
        }
    }

    fn doc_with_markers(ids: &[&str]) -> MapDocument {
        MapDocument {
            markers: ids.iter().map(|id| Item::new(*id, Map::new())).collect(),
            polygons: Vec::new(),
        }
    }

    fn context(records: Vec<VersionRecord>, snapshots: Vec<(&str, Slot<MapDocument>)>) -> AuditContext {
        let mut ledger = Ledger::new();
        for r in records {
            ledger.append("default", r);
        }
        AuditContext {
            map_name: "default".into(),
            draft: Slot::Missing,
            current: Slot::Missing,
            ledger: Slot::Present(ledger),
            snapshots: snapshots
                .into_iter()
                .map(|(r, s)| (r.to_string(), s))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn count_mismatch_is_a_warning() {
        let ctx = context(
            vec![record("v1", 3)],
            vec![("v1", Slot::Present(doc_with_markers(&["a"])))],
        );

        let findings = LedgerCountsMatch.inspect(&ctx);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].0, Severity::Warning);
    }

    #[test]
    fn duplicate_in_current_is_critical() {
        let mut ctx = context(vec![], vec![]);
        ctx.current = Slot::Present(doc_with_markers(&["a", "a"]));

        let findings = UniqueItemIds.inspect(&ctx);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].0, Severity::Critical);
        assert!(findings[0].1.contains("current document"));
    }

    #[test]
    fn diverged_current_is_informational() {
        let mut ctx = context(
            vec![record("v1", 1)],
            vec![("v1", Slot::Present(doc_with_markers(&["a"])))],
        );
        ctx.current = Slot::Present(doc_with_markers(&["b"]));

        let findings = CurrentMatchesLatest.inspect(&ctx);

        assert_eq!(findings, vec![(
            Severity::Info,
            "current document differs from latest snapshot `v1`".to_string()
        )]);
    }

    #[test]
    fn malformed_ledger_is_flagged() {
        let mut ctx = context(vec![], vec![]);
        ctx.ledger = Slot::Malformed("eof".into());

        let findings = ReadableDocuments.inspect(&ctx);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].1.starts_with("ledger is malformed"));
    }
}
