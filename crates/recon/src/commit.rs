//! Apply reviewed outcomes to the persisted store.
//!
//! Buckets are committed in [`Bucket::COMMIT_ORDER`]: removals free identities
//! first, renames may synthesize an add+remove pair, then plain additions,
//! ambiguous items and field updates. Nothing here is transactional; items
//! applied before a failure stay applied and a re-run picks up the rest.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::compare::compare_records;
use crate::config::{CommitMode, FieldNames};
use crate::error::ReconError;
use crate::model::{Bucket, CommitAction, FieldStatus, Outcome, Record, ReconciliationResult};
use crate::store::CatalogStore;

/// Suffix appended to a retired entity's id.
pub const RETIRED_SUFFIX: &str = "retired";

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitReport {
    pub mode: CommitMode,
    pub updated: usize,
    pub added: usize,
    pub removed: usize,
    pub retired: usize,
    /// Outcomes whose effective action was `None`.
    pub skipped: usize,
    /// Actions refused by a safety check (references, id collisions, mode).
    pub refused: Vec<String>,
    /// Unexpected field statuses met while updating.
    pub anomalies: Vec<String>,
    /// Store errors on individual items.
    pub failures: Vec<String>,
    /// True when persisted state was mutated (and saved once).
    pub changed: bool,
}

impl CommitReport {
    fn refuse(&mut self, msg: String) {
        tracing::warn!("{msg}");
        self.refused.push(msg);
    }

    fn fail(&mut self, msg: String) {
        tracing::warn!("{msg}");
        self.failures.push(msg);
    }
}

/// Identity changes a review run has pretended to make, so later items see
/// the same free and taken ids a full run would.
#[derive(Debug, Default)]
struct PendingIds {
    freed: BTreeSet<String>,
    claimed: BTreeSet<String>,
}

impl PendingIds {
    fn free(&mut self, id: &str) {
        self.claimed.remove(id);
        self.freed.insert(id.to_string());
    }

    fn claim(&mut self, id: &str) {
        self.freed.remove(id);
        self.claimed.insert(id.to_string());
    }
}

pub struct Committer<'a, S: CatalogStore> {
    store: &'a mut S,
    fields: &'a FieldNames,
    mode: CommitMode,
    pending: PendingIds,
}

impl<'a, S: CatalogStore> Committer<'a, S> {
    pub fn new(store: &'a mut S, fields: &'a FieldNames, mode: CommitMode) -> Self {
        Self {
            store,
            fields,
            mode,
            pending: PendingIds::default(),
        }
    }

    /// Commit every actionable bucket.
    pub fn commit_all(
        &mut self,
        result: &ReconciliationResult,
    ) -> Result<CommitReport, ReconError> {
        self.commit(result, &Bucket::COMMIT_ORDER)
    }

    /// Commit the listed buckets, always in commit order.
    ///
    /// Saves the store exactly once at the end if anything changed. A failed
    /// save is returned as [`ReconError::Save`]; applied items are not undone.
    pub fn commit(
        &mut self,
        result: &ReconciliationResult,
        buckets: &[Bucket],
    ) -> Result<CommitReport, ReconError> {
        let mut report = CommitReport {
            mode: self.mode,
            ..CommitReport::default()
        };
        let mut dirty = false;
        self.pending = PendingIds::default();

        for bucket in Bucket::COMMIT_ORDER {
            if !buckets.contains(&bucket) {
                continue;
            }
            for outcome in chain_order(result.bucket(bucket)) {
                let action = result.action_for(bucket, outcome);
                dirty |= self.apply(bucket, outcome, action, &mut report);
            }
        }
        if buckets.contains(&Bucket::Same) {
            tracing::debug!("same outcomes are never committed");
        }

        if dirty {
            self.store.save().map_err(|e| {
                tracing::error!("save failed after commit: {e}");
                ReconError::Save(e.to_string())
            })?;
            report.changed = true;
        }

        tracing::info!(
            "commit ({}): {} updated, {} added, {} removed, {} retired, {} skipped, {} refused",
            report.mode,
            report.updated,
            report.added,
            report.removed,
            report.retired,
            report.skipped,
            report.refused.len(),
        );
        Ok(report)
    }

    /// Whether `id` is taken, counting identity changes simulated in review.
    fn exists(&self, id: &str) -> bool {
        if self.pending.claimed.contains(id) {
            return true;
        }
        !self.pending.freed.contains(id) && self.store.contains(id)
    }

    fn current(&self, id: &str) -> Option<Record> {
        if self.pending.freed.contains(id) {
            return None;
        }
        self.store.record(id)
    }

    fn apply(
        &mut self,
        bucket: Bucket,
        outcome: &Outcome,
        action: CommitAction,
        report: &mut CommitReport,
    ) -> bool {
        let (old_id, record) = match outcome {
            Outcome::Same { .. } => return false,
            Outcome::Changed { id, record, .. } => (Some(id.as_str()), Some(record)),
            Outcome::Renamed { old_id, record, .. } => (Some(old_id.as_str()), Some(record)),
            Outcome::Added { record, .. } => (None, Some(record)),
            Outcome::Removed { id } => (Some(id.as_str()), None),
        };

        match (action, old_id, record) {
            (CommitAction::None, _, _) => {
                report.skipped += 1;
                false
            }
            (CommitAction::Update, Some(id), Some(record)) => self.update(id, record, report),
            (CommitAction::Remove, Some(id), _) => self.remove(id, report),
            (CommitAction::Retire, Some(id), _) => self.retire(id, report),
            (CommitAction::Add, _, Some(record)) => self.add(record, report),
            (CommitAction::AddAndRemove, Some(id), Some(record)) => {
                let removed = self.remove(id, report);
                let added = self.add(record, report);
                removed || added
            }
            (action, _, _) => {
                report.fail(format!(
                    "{bucket} item {:?}: action '{action}' has nothing to act on",
                    outcome.action_key(bucket)
                ));
                false
            }
        }
    }

    fn update(&mut self, id: &str, record: &Record, report: &mut CommitReport) -> bool {
        let Some(current) = self.current(id) else {
            report.fail(format!("update {id:?}: not in store"));
            return false;
        };

        let diff = compare_records(&current, record, &self.fields.ignored);
        let mut changes = Record::new();
        for (field, status) in &diff {
            match status {
                FieldStatus::Unequal => {
                    changes.insert(field.as_str(), record.value(field));
                }
                FieldStatus::Equal | FieldStatus::EqualWithCoercion => {}
                FieldStatus::OnlyInOld | FieldStatus::OnlyInNew | FieldStatus::Unknown => {
                    let msg = format!("update {id:?}: field '{field}' is {status}, skipped");
                    tracing::warn!("{msg}");
                    report.anomalies.push(msg);
                }
            }
        }

        if changes.is_empty() {
            return false;
        }

        let new_id = changes.get(&self.fields.id);
        if let Some(new_id) = new_id {
            if self.exists(new_id) {
                report.refuse(format!("update {id:?}: new id {new_id:?} is still taken"));
                return false;
            }
        }

        if self.mode == CommitMode::Review {
            tracing::info!("review: would update {id:?} ({} fields)", changes.len());
            if let Some(new_id) = new_id {
                self.pending.free(id);
                self.pending.claim(new_id);
            }
            report.updated += 1;
            return false;
        }

        match self.store.update(id, &changes) {
            Ok(()) => {
                tracing::debug!("updated {id:?} ({} fields)", changes.len());
                report.updated += 1;
                true
            }
            Err(e) => {
                report.fail(format!("update {id:?}: {e}"));
                false
            }
        }
    }

    fn remove(&mut self, id: &str, report: &mut CommitReport) -> bool {
        if !self.exists(id) {
            report.fail(format!("remove {id:?}: not in store"));
            return false;
        }
        let refs = self.store.reference_count(id);
        if refs > 0 {
            report.refuse(format!("remove {id:?}: still referenced by {refs} record(s)"));
            return false;
        }
        match self.mode {
            CommitMode::Live => {
                report.refuse(format!("remove {id:?}: hard deletes are disabled in live mode"));
                false
            }
            CommitMode::Review => {
                tracing::info!("review: would remove {id:?}");
                self.pending.free(id);
                report.removed += 1;
                false
            }
            CommitMode::Full => match self.store.remove(id) {
                Ok(()) => {
                    tracing::debug!("removed {id:?}");
                    report.removed += 1;
                    true
                }
                Err(e) => {
                    report.fail(format!("remove {id:?}: {e}"));
                    false
                }
            },
        }
    }

    fn retire(&mut self, id: &str, report: &mut CommitReport) -> bool {
        let Some(current) = self.current(id) else {
            report.fail(format!("retire {id:?}: not in store"));
            return false;
        };
        let changes = retirement_changes(&current, id, self.fields);

        let new_id = changes.get(&self.fields.id);
        if let Some(new_id) = new_id {
            if self.exists(new_id) {
                report.refuse(format!("retire {id:?}: {new_id:?} already exists"));
                return false;
            }
        }

        if self.mode == CommitMode::Review {
            tracing::info!("review: would retire {id:?}");
            if let Some(new_id) = new_id {
                self.pending.free(id);
                self.pending.claim(new_id);
            }
            report.retired += 1;
            return false;
        }

        match self.store.update(id, &changes) {
            Ok(()) => {
                tracing::debug!("retired {id:?}");
                report.retired += 1;
                true
            }
            Err(e) => {
                report.fail(format!("retire {id:?}: {e}"));
                false
            }
        }
    }

    fn add(&mut self, record: &Record, report: &mut CommitReport) -> bool {
        let id = record.value(&self.fields.id);
        if id.is_empty() {
            report.fail("add: record has no id".to_string());
            return false;
        }
        if self.exists(id) {
            report.refuse(format!("add {id:?}: id already exists"));
            return false;
        }

        if self.mode == CommitMode::Review {
            tracing::info!("review: would add {id:?}");
            self.pending.claim(id);
            report.added += 1;
            return false;
        }

        let sequence = self.store.count();
        match self.store.insert(sequence, record.clone()) {
            Ok(()) => {
                tracing::debug!("added {id:?} as #{sequence}");
                report.added += 1;
                true
            }
            Err(e) => {
                report.fail(format!("add {id:?}: {e}"));
                false
            }
        }
    }
}

/// Order a bucket so an outcome that vacates an id runs before the one that
/// claims it (old Z -> Y before old Q -> Z). Only renames change ids; other
/// buckets keep their sorted order. Cycles fall back to sorted order and the
/// blocked item is refused as "still taken".
fn chain_order(outcomes: &[Outcome]) -> Vec<&Outcome> {
    let mut pending: Vec<&Outcome> = outcomes.iter().collect();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|o| {
            let claims = match o {
                Outcome::Renamed { old_id, new_id, .. } if old_id != new_id => new_id.as_str(),
                _ => return true,
            };
            !pending.iter().any(|other| other.old_id() == Some(claims))
        });
        ordered.push(pending.remove(ready.unwrap_or(0)));
    }
    ordered
}

/// Field changes that put a persisted record into the retired sentinel state.
///
/// The exclusion marker goes negative (`1` → `-3`, anything else → `-2`) and
/// the id gains [`RETIRED_SUFFIX`], freeing the original id for reuse.
pub fn retirement_changes(current: &Record, id: &str, fields: &FieldNames) -> Record {
    let mut changes = Record::new();
    let marker = match current.value(&fields.exclusion).trim() {
        "1" => "-3",
        m if m.parse::<i64>().is_ok_and(|v| v < 0) => m,
        _ => "-2",
    };
    changes.insert(fields.exclusion.as_str(), marker);
    if !id.ends_with(RETIRED_SUFFIX) {
        changes.insert(fields.id.as_str(), format!("{id}{RETIRED_SUFFIX}"));
    }
    changes
}
