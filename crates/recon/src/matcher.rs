use std::collections::{BTreeMap, BTreeSet};

use crate::compare::compare_records;
use crate::config::{FieldNames, RenamePolicy};
use crate::model::{Outcome, Record};

/// Renames found between deletion and addition candidates.
#[derive(Debug, Default)]
pub struct RenameMatches {
    pub renamed: Vec<Outcome>,
    pub renamed_old: BTreeSet<String>,
    pub renamed_new: BTreeSet<String>,
}

/// Pair deletion candidates with addition candidates sharing the same description.
///
/// Both candidate sets are walked in id order so the first-match tie-break is
/// reproducible. Empty descriptions never match.
pub fn match_renames(
    deleted: &BTreeSet<String>,
    added: &BTreeSet<String>,
    old: &BTreeMap<String, &Record>,
    new: &BTreeMap<String, &Record>,
    fields: &FieldNames,
    policy: RenamePolicy,
) -> RenameMatches {
    let desc_of = |index: &BTreeMap<String, &Record>, id: &str| -> String {
        index
            .get(id)
            .map(|r| r.value(&fields.key).to_string())
            .unwrap_or_default()
    };

    // description → candidate count, used by the unique policy
    let mut added_by_desc: BTreeMap<String, usize> = BTreeMap::new();
    let mut deleted_by_desc: BTreeMap<String, usize> = BTreeMap::new();
    if policy == RenamePolicy::Unique {
        for id in added {
            *added_by_desc.entry(desc_of(new, id)).or_insert(0) += 1;
        }
        for id in deleted {
            *deleted_by_desc.entry(desc_of(old, id)).or_insert(0) += 1;
        }
    }

    let mut out = RenameMatches::default();

    for old_id in deleted {
        let Some(old_rec) = old.get(old_id) else {
            continue;
        };
        let desc = old_rec.value(&fields.key);
        if desc.is_empty() {
            continue;
        }

        if policy == RenamePolicy::Unique {
            let on_new = added_by_desc.get(desc).copied().unwrap_or(0);
            let on_old = deleted_by_desc.get(desc).copied().unwrap_or(0);
            if on_new != 1 || on_old != 1 {
                if on_new > 0 {
                    tracing::info!(
                        "description {desc:?} not unique ({on_old} old, {on_new} new); no rename for {old_id:?}"
                    );
                }
                continue;
            }
        }

        let found = added
            .iter()
            .filter(|id| !out.renamed_new.contains(*id))
            .find_map(|id| {
                new.get(id)
                    .filter(|r| r.value(&fields.key) == desc)
                    .map(|r| (id, *r))
            });

        if let Some((new_id, new_rec)) = found {
            tracing::debug!("rename {old_id:?} -> {new_id:?} ({desc:?})");
            let diff = compare_records(old_rec, new_rec, &fields.ignored);
            out.renamed.push(Outcome::Renamed {
                old_id: old_id.clone(),
                new_id: new_id.clone(),
                record: new_rec.clone(),
                diff,
            });
            out.renamed_old.insert(old_id.clone());
            out.renamed_new.insert(new_id.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{index_snapshot, Side};
    use crate::model::field;

    fn rec(id: &str, desc: &str) -> Record {
        Record::from_iter([(field::ID, id), (field::DESCRIPTION, desc)])
    }

    fn ids(v: &[&str]) -> BTreeSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn run(old: &[Record], new: &[Record], policy: RenamePolicy) -> RenameMatches {
        let fields = FieldNames::default();
        let oi = index_snapshot(old, &fields.id, Side::Old);
        let ni = index_snapshot(new, &fields.id, Side::New);
        let deleted: BTreeSet<String> = oi.keys().cloned().collect();
        let added: BTreeSet<String> = ni.keys().cloned().collect();
        match_renames(&deleted, &added, &oi, &ni, &fields, policy)
    }

    #[test]
    fn simple_rename() {
        let m = run(&[rec("A", "X")], &[rec("B", "X")], RenamePolicy::FirstMatch);
        assert_eq!(m.renamed.len(), 1);
        assert_eq!(m.renamed[0].old_id(), Some("A"));
        assert_eq!(m.renamed[0].new_id(), Some("B"));
        assert_eq!(m.renamed_old, ids(&["A"]));
        assert_eq!(m.renamed_new, ids(&["B"]));
    }

    #[test]
    fn first_match_in_id_order() {
        let old = [rec("A", "X"), rec("B", "X")];
        let new = [rec("D", "X"), rec("C", "X")];
        let m = run(&old, &new, RenamePolicy::FirstMatch);
        let pairs: Vec<_> = m
            .renamed
            .iter()
            .map(|o| (o.old_id().unwrap(), o.new_id().unwrap()))
            .collect();
        assert_eq!(pairs, vec![("A", "C"), ("B", "D")]);
    }

    #[test]
    fn consumed_candidate_not_reused() {
        let old = [rec("A", "X"), rec("B", "X")];
        let new = [rec("C", "X")];
        let m = run(&old, &new, RenamePolicy::FirstMatch);
        assert_eq!(m.renamed.len(), 1);
        assert_eq!(m.renamed_old, ids(&["A"]));
    }

    #[test]
    fn unique_policy_refuses_ties() {
        let old = [rec("A", "X"), rec("E", "Y")];
        let new = [rec("C", "X"), rec("D", "X"), rec("F", "Y")];
        let m = run(&old, &new, RenamePolicy::Unique);
        assert_eq!(m.renamed.len(), 1);
        assert_eq!(m.renamed[0].old_id(), Some("E"));
        assert_eq!(m.renamed[0].new_id(), Some("F"));
    }

    #[test]
    fn empty_description_never_matches() {
        let m = run(&[rec("A", "")], &[rec("B", "")], RenamePolicy::FirstMatch);
        assert!(m.renamed.is_empty());
    }
}
