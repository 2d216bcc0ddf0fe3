use serde::Serialize;

use crate::config::{CommitMode, ReconConfig, RenamePolicy};
use crate::model::{Bucket, CommitAction, ReconciliationResult};

/// Per-run bucket counts.
///
/// Snapshot totals are derived from the partition: every indexed old id sits
/// in exactly one of same/changed/renamed/removed/ambiguous, every indexed new
/// id in one of same/changed/renamed/added/ambiguous/rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total_old: usize,
    pub total_new: usize,
    pub same: usize,
    pub changed: usize,
    pub renamed: usize,
    pub added: usize,
    pub removed: usize,
    pub ambiguous: usize,
    pub rejected: usize,
    /// Outcomes whose effective action is not `None`.
    pub actionable: usize,
}

/// Compute summary statistics from a classified result.
pub fn compute_summary(result: &ReconciliationResult) -> ReconSummary {
    let n = |b: Bucket| result.bucket(b).len();
    let (same, changed, renamed) = (n(Bucket::Same), n(Bucket::Changed), n(Bucket::Renamed));
    let (added, removed, ambiguous) = (n(Bucket::Added), n(Bucket::Removed), n(Bucket::Ambiguous));
    let rejected = result.rejected.len();
    let actionable = result
        .actionable()
        .filter(|(bucket, outcome)| result.action_for(*bucket, outcome) != CommitAction::None)
        .count();

    ReconSummary {
        total_old: same + changed + renamed + removed + ambiguous,
        total_new: same + changed + renamed + added + ambiguous + rejected,
        same,
        changed,
        renamed,
        added,
        removed,
        ambiguous,
        rejected,
        actionable,
    }
}

impl ReconSummary {
    /// Ids matched directly (same or changed).
    pub fn found(&self) -> usize {
        self.same + self.changed
    }

    /// Candidates left over once ids were matched, before rename analysis.
    pub fn unmatched_new(&self) -> usize {
        self.total_new - self.found()
    }

    pub fn unmatched_old(&self) -> usize {
        self.total_old - self.found()
    }

    pub fn balance(&self) -> &'static str {
        match self.unmatched_old().cmp(&self.unmatched_new()) {
            std::cmp::Ordering::Greater => "More deletions than insertions.",
            std::cmp::Ordering::Less => "More insertions than deletions.",
            std::cmp::Ordering::Equal => "Same number of deletions and insertions.",
        }
    }

    /// The two-line run report.
    pub fn report_lines(&self) -> [String; 2] {
        [
            format!(
                "Of the {} imported lines, {} were found by id, leading to {} updates and {} preserved.",
                self.total_new,
                self.found(),
                self.changed,
                self.same
            ),
            format!(
                "Of the rest ({} additions vs. {} deletions), there are {} real additions, {} real deletions, {} id changes and {} ambiguous.",
                self.unmatched_new(),
                self.unmatched_old(),
                self.added,
                self.removed,
                self.renamed,
                self.ambiguous
            ),
        ]
    }

    pub fn log(&self, label: &str) {
        tracing::info!("{label}: {}", self.balance());
        for line in self.report_lines() {
            tracing::info!("{label}: {line}");
        }
        if self.rejected > 0 {
            tracing::warn!("{label}: {} addition candidates rejected", self.rejected);
        }
    }
}

// ---------------------------------------------------------------------------
// Report envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    pub engine_version: String,
    pub run_at: String,
    pub categories: Vec<i32>,
    pub rename_policy: RenamePolicy,
    pub commit_mode: CommitMode,
}

/// Serializable run output: metadata, summary and the classified buckets.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub result: ReconciliationResult,
}

impl ReconReport {
    pub fn new(config: &ReconConfig, result: ReconciliationResult) -> Self {
        Self {
            meta: ReconMeta {
                config_name: config.name.clone(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
                categories: result.categories.clone(),
                rename_policy: config.matching.rename_policy,
                commit_mode: config.commit.mode,
            },
            summary: compute_summary(&result),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Outcome, Record};

    fn sample() -> ReconciliationResult {
        let mut r = ReconciliationResult::new(3);
        r.push(Bucket::Same, Outcome::Same { id: "a".into() });
        r.push(Bucket::Same, Outcome::Same { id: "b".into() });
        r.push(
            Bucket::Changed,
            Outcome::Changed { id: "c".into(), record: Record::new(), diff: Default::default() },
        );
        r.push(Bucket::Added, Outcome::Added { id: "d".into(), record: Record::new() });
        r.push(Bucket::Added, Outcome::Added { id: "e".into(), record: Record::new() });
        r.push(Bucket::Removed, Outcome::Removed { id: "f".into() });
        r.rejected.push("-".into());
        r
    }

    #[test]
    fn summary_counts() {
        let s = compute_summary(&sample());
        assert_eq!(s.total_old, 4);
        assert_eq!(s.total_new, 6);
        assert_eq!(s.found(), 3);
        assert_eq!(s.actionable, 4);
        assert_eq!(s.balance(), "More insertions than deletions.");
    }

    #[test]
    fn none_overrides_are_not_actionable() {
        let mut r = sample();
        r.set_action("d", CommitAction::None).unwrap();
        assert_eq!(compute_summary(&r).actionable, 3);
    }

    #[test]
    fn report_lines_read_like_the_log() {
        let [first, second] = compute_summary(&sample()).report_lines();
        assert_eq!(
            first,
            "Of the 6 imported lines, 3 were found by id, leading to 1 updates and 2 preserved."
        );
        assert!(second.starts_with("Of the rest (3 additions vs. 1 deletions)"));
    }

    #[test]
    fn report_meta_tracks_result() {
        let report = ReconReport::new(&ReconConfig::default(), sample());
        assert_eq!(report.meta.categories, vec![3]);
        assert_eq!(report.meta.commit_mode, CommitMode::Full);
        assert_eq!(report.summary.same, 2);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["meta"]["run_at"].is_string());
        assert!(json["meta"].get("config_name").is_none());
    }
}
