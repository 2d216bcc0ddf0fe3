use std::collections::{BTreeMap, BTreeSet};

use crate::classify::PhaseOne;
use crate::matcher::RenameMatches;
use crate::model::{Outcome, Record};

/// Final split of the candidates left after rename matching.
#[derive(Debug, Default)]
pub struct Resolution {
    pub ambiguous: Vec<Outcome>,
    pub added: Vec<Outcome>,
    pub removed: Vec<Outcome>,
    pub rejected: Vec<String>,
}

/// Addition candidates must start with a letter or digit; separator and
/// placeholder rows from the source fail this.
pub fn is_plausible_id(id: &str) -> bool {
    id.chars().next().is_some_and(char::is_alphanumeric)
}

/// Split unresolved candidates into ambiguous, added and removed outcomes.
pub fn resolve(
    phase_one: &PhaseOne,
    matches: &RenameMatches,
    new: &BTreeMap<String, &Record>,
) -> Resolution {
    let real_added: BTreeSet<&String> = phase_one
        .added
        .iter()
        .filter(|id| !matches.renamed_new.contains(*id))
        .collect();
    let real_deleted: BTreeSet<&String> = phase_one
        .deleted
        .iter()
        .filter(|id| !matches.renamed_old.contains(*id))
        .collect();
    let ambiguous: BTreeSet<&String> = real_added.intersection(&real_deleted).copied().collect();

    let mut out = Resolution::default();

    for id in &ambiguous {
        let Some(record) = new.get(*id) else {
            continue;
        };
        tracing::info!("id {id:?} is both an unmatched deletion and addition; needs review");
        out.ambiguous.push(Outcome::Changed {
            id: (*id).clone(),
            record: (*record).clone(),
            diff: phase_one.deferred.get(*id).cloned().unwrap_or_default(),
        });
    }

    for id in real_added.difference(&ambiguous) {
        if !is_plausible_id(id) {
            tracing::warn!(
                "rejecting addition candidate {id:?}: id must start with a letter or digit"
            );
            out.rejected.push((*id).clone());
            continue;
        }
        if let Some(record) = new.get(*id) {
            out.added.push(Outcome::Added {
                id: (*id).clone(),
                record: (*record).clone(),
            });
        }
    }

    for id in real_deleted.difference(&ambiguous) {
        out.removed.push(Outcome::Removed { id: (*id).clone() });
    }

    out
}
