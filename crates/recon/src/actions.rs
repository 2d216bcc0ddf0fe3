//! Commit action table.
//!
//! Every bucket has a fixed list of allowed actions whose first entry is the
//! default. A caller-owned [`ActionTable`] records explicit choices that
//! override the default, keyed by [`Outcome::action_key`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{Bucket, CommitAction, Outcome, ReconciliationResult};

impl Bucket {
    /// Actions a reviewer may pick for this bucket. The first is the default.
    pub fn allowed_actions(&self) -> &'static [CommitAction] {
        use CommitAction::*;
        match self {
            Bucket::Same => &[None],
            Bucket::Removed => &[Retire, Remove, None],
            Bucket::Added => &[Add, None],
            Bucket::Changed => &[Update, None],
            Bucket::Renamed | Bucket::Ambiguous => &[Update, AddAndRemove, Remove, None],
        }
    }

    pub fn default_action(&self) -> CommitAction {
        self.allowed_actions()[0]
    }

    pub fn allows(&self, action: CommitAction) -> bool {
        self.allowed_actions().contains(&action)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionTable {
    overrides: BTreeMap<String, CommitAction>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective action for the outcome stored under `key` in `bucket`.
    pub fn action_for(&self, bucket: Bucket, key: &str) -> CommitAction {
        match self.overrides.get(key) {
            Some(action) if bucket.allows(*action) => *action,
            _ => bucket.default_action(),
        }
    }

    /// Record an explicit choice. Choosing the default clears the override.
    pub fn set(
        &mut self,
        bucket: Bucket,
        key: &str,
        action: CommitAction,
    ) -> Result<(), ReconError> {
        if !bucket.allows(action) {
            return Err(ReconError::ActionNotAllowed { bucket, action });
        }
        if action == bucket.default_action() {
            self.overrides.remove(key);
        } else {
            self.overrides.insert(key.to_string(), action);
        }
        Ok(())
    }

    /// Advance to the next allowed action, wrapping back to the default.
    pub fn cycle(&mut self, bucket: Bucket, key: &str) -> CommitAction {
        let allowed = bucket.allowed_actions();
        let current = self.action_for(bucket, key);
        let pos = allowed.iter().position(|a| *a == current).unwrap_or(0);
        let next = allowed[(pos + 1) % allowed.len()];
        if next == bucket.default_action() {
            self.overrides.remove(key);
        } else {
            self.overrides.insert(key.to_string(), next);
        }
        next
    }

    pub fn clear(&mut self, key: &str) {
        self.overrides.remove(key);
    }

    pub fn overrides(&self) -> &BTreeMap<String, CommitAction> {
        &self.overrides
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Take over `other`'s overrides; `other` wins on key collisions.
    pub fn merge(&mut self, other: ActionTable) {
        self.overrides.extend(other.overrides);
    }
}

impl ReconciliationResult {
    /// Effective action for a single outcome.
    pub fn action_for(&self, bucket: Bucket, outcome: &Outcome) -> CommitAction {
        self.actions.action_for(bucket, &outcome.action_key(bucket))
    }

    /// Override the action for the outcome stored under `key`.
    pub fn set_action(&mut self, key: &str, action: CommitAction) -> Result<(), ReconError> {
        let bucket = self
            .find(key)
            .map(|(bucket, _)| bucket)
            .ok_or_else(|| ReconError::UnknownActionKey(key.to_string()))?;
        self.actions.set(bucket, key, action)
    }

    /// Cycle the action for the outcome stored under `key`.
    pub fn cycle_action(&mut self, key: &str) -> Result<CommitAction, ReconError> {
        let bucket = self
            .find(key)
            .map(|(bucket, _)| bucket)
            .ok_or_else(|| ReconError::UnknownActionKey(key.to_string()))?;
        Ok(self.actions.cycle(bucket, key))
    }

    /// Apply configured overrides. Unknown keys and disallowed actions are
    /// logged and skipped; returns how many were applied.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, CommitAction>) -> usize {
        let mut applied = 0;
        for (key, action) in overrides {
            match self.set_action(key, *action) {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!("skipping override {key:?}: {e}"),
            }
        }
        applied
    }
}
