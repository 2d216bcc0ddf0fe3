use std::collections::BTreeSet;

use crate::ambiguity::resolve;
use crate::classify::{classify_common, index_snapshot, Side};
use crate::config::ReconConfig;
use crate::matcher::match_renames;
use crate::model::{Bucket, Record, ReconciliationResult};
use crate::source::SourceCategory;
use crate::store::{comparable_records, CatalogStore};
use crate::summary::compute_summary;

/// Reconcile one category's persisted snapshot against its live snapshot.
///
/// Pure: the inputs are only read. Either side may be empty; an empty old
/// side makes every valid new id an addition and vice versa.
pub fn reconcile(
    category: i32,
    old: &[Record],
    new: &[Record],
    config: &ReconConfig,
) -> ReconciliationResult {
    let fields = &config.fields;
    tracing::info!(
        "category {category}: comparing {} persisted records with {} live records",
        old.len(),
        new.len()
    );

    let old_index = index_snapshot(old, &fields.id, Side::Old);
    let new_index = index_snapshot(new, &fields.id, Side::New);

    let phase_one = classify_common(&old_index, &new_index, fields);
    let matches = match_renames(
        &phase_one.deleted,
        &phase_one.added,
        &old_index,
        &new_index,
        fields,
        config.matching.rename_policy,
    );
    let resolution = resolve(&phase_one, &matches, &new_index);

    let mut result = ReconciliationResult::new(category);
    for outcome in phase_one.same {
        result.push(Bucket::Same, outcome);
    }
    for outcome in phase_one.changed {
        result.push(Bucket::Changed, outcome);
    }
    for outcome in matches.renamed {
        result.push(Bucket::Renamed, outcome);
    }
    for outcome in resolution.ambiguous {
        result.push(Bucket::Ambiguous, outcome);
    }
    for outcome in resolution.added {
        result.push(Bucket::Added, outcome);
    }
    for outcome in resolution.removed {
        result.push(Bucket::Removed, outcome);
    }
    result.rejected = resolution.rejected;
    result.sort();

    compute_summary(&result).log(&format!("category {category}"));
    result
}

/// Reconcile every live category against the store and merge the results.
///
/// Categories without a catalog counterpart are skipped, as are categories
/// where either side has nothing to compare. Each internal category is
/// reconciled at most once: a later live category translating to one already
/// seen is skipped. Configured overrides are applied to the merged result.
pub fn reconcile_store<S: CatalogStore + ?Sized>(
    store: &S,
    live: &[SourceCategory],
    config: &ReconConfig,
) -> ReconciliationResult {
    let mut merged = ReconciliationResult::default();
    let mut seen = BTreeSet::new();

    for category in live {
        let Some(internal) = category.internal_number() else {
            tracing::info!(
                "live category {} ({:?}) has no catalog counterpart, skipped",
                category.number,
                category.name
            );
            continue;
        };
        if !seen.insert(internal) {
            tracing::warn!(
                "live category {} ({:?}) also maps to category {internal}; skipped",
                category.number,
                category.name
            );
            continue;
        }

        let old = comparable_records(store, internal, &config.fields);
        if old.is_empty() {
            tracing::info!("no persisted records to compare in category {internal}");
            continue;
        }
        let new = category.records();
        if new.is_empty() {
            tracing::info!(
                "no live records to compare in category {internal} (live category {})",
                category.number
            );
            continue;
        }

        merged.merge(reconcile(internal, &old, &new, config));
    }

    merged.sort();
    let applied = merged.apply_overrides(&config.overrides);
    if applied > 0 {
        tracing::info!("applied {applied} configured action overrides");
    }
    merged
}
