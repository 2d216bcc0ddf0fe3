use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actions::ActionTable;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One catalog entry's exported attributes, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Value of `field`, or the empty string when absent.
    pub fn value(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite every field present in `changes`.
    pub fn merge_from(&mut self, changes: &Record) {
        for (field, value) in changes.iter() {
            self.0.insert(field.to_string(), value.to_string());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for Record {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Well-known field names of the exported catalog record.
pub mod field {
    pub const ID: &str = "id";
    pub const DESCRIPTION: &str = "descriptionX";
    pub const STATUS: &str = "status";
    pub const PICTID: &str = "pictid";
    pub const PICTYPE: &str = "pictype";
    pub const GROUP: &str = "group";
    pub const CAT1: &str = "cat1";
    pub const CAT2: &str = "cat2";
    pub const CATEGORY: &str = "catgDisplayNum";
    pub const ROWNUM: &str = "rownum";

    pub const PRICES: [&str; 4] = ["price1", "price2", "price3", "price4"];
    pub const BUYS: [&str; 4] = ["buy1", "buy2", "buy3", "buy4"];
    pub const OLD_PRICES: [&str; 4] = ["oldprice1", "oldprice2", "oldprice3", "oldprice4"];
}

// ---------------------------------------------------------------------------
// Field comparison
// ---------------------------------------------------------------------------

/// Per-field comparison status, ordered from weakest to strongest match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Unknown,
    OnlyInNew,
    OnlyInOld,
    Unequal,
    EqualWithCoercion,
    Equal,
}

impl std::fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::OnlyInNew => write!(f, "only_in_new"),
            Self::OnlyInOld => write!(f, "only_in_old"),
            Self::Unequal => write!(f, "unequal"),
            Self::EqualWithCoercion => write!(f, "equal_with_coercion"),
            Self::Equal => write!(f, "equal"),
        }
    }
}

/// Field name → status for one old/new record pair.
pub type FieldDiff = BTreeMap<String, FieldStatus>;

/// A field that did not survive comparison, with both sides' values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub status: FieldStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Same,
    Changed,
    Renamed,
    Added,
    Removed,
    Ambiguous,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Same,
        Bucket::Changed,
        Bucket::Renamed,
        Bucket::Added,
        Bucket::Removed,
        Bucket::Ambiguous,
    ];

    /// Commit order: removals free identities before renames and additions reuse them.
    pub const COMMIT_ORDER: [Bucket; 5] = [
        Bucket::Removed,
        Bucket::Renamed,
        Bucket::Added,
        Bucket::Ambiguous,
        Bucket::Changed,
    ];
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Same => write!(f, "same"),
            Self::Changed => write!(f, "changed"),
            Self::Renamed => write!(f, "renamed"),
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// What committing an outcome does to the persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitAction {
    None,
    Add,
    Remove,
    Retire,
    Update,
    AddAndRemove,
}

impl std::fmt::Display for CommitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::Retire => write!(f, "retire"),
            Self::Update => write!(f, "update"),
            Self::AddAndRemove => write!(f, "add_and_remove"),
        }
    }
}

/// Classification of one record (or one old/new record pair).
///
/// The ambiguous bucket holds `Changed`-shaped outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Same {
        id: String,
    },
    Changed {
        id: String,
        record: Record,
        diff: FieldDiff,
    },
    Renamed {
        old_id: String,
        new_id: String,
        record: Record,
        diff: FieldDiff,
    },
    Added {
        id: String,
        record: Record,
    },
    Removed {
        id: String,
    },
}

impl Outcome {
    /// Persisted identity this outcome refers to, if any.
    pub fn old_id(&self) -> Option<&str> {
        match self {
            Self::Same { id } | Self::Changed { id, .. } | Self::Removed { id } => Some(id),
            Self::Renamed { old_id, .. } => Some(old_id),
            Self::Added { .. } => None,
        }
    }

    /// Live identity this outcome refers to, if any.
    pub fn new_id(&self) -> Option<&str> {
        match self {
            Self::Same { id } | Self::Changed { id, .. } | Self::Added { id, .. } => Some(id),
            Self::Renamed { new_id, .. } => Some(new_id),
            Self::Removed { .. } => None,
        }
    }

    /// Live record carried by this outcome, if any.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Changed { record, .. }
            | Self::Renamed { record, .. }
            | Self::Added { record, .. } => Some(record),
            Self::Same { .. } | Self::Removed { .. } => None,
        }
    }

    pub fn diff(&self) -> Option<&FieldDiff> {
        match self {
            Self::Changed { diff, .. } | Self::Renamed { diff, .. } => Some(diff),
            Self::Same { .. } | Self::Added { .. } | Self::Removed { .. } => None,
        }
    }

    /// Key under which an override action is stored for this outcome in `bucket`.
    ///
    /// Renamed and ambiguous outcomes concatenate old and new id; everything
    /// else uses its single id.
    pub fn action_key(&self, bucket: Bucket) -> String {
        match (bucket, self) {
            (Bucket::Renamed | Bucket::Ambiguous, _) => {
                format!("{}{}", self.old_id().unwrap_or(""), self.new_id().unwrap_or(""))
            }
            (_, Self::Added { id, .. }) => id.clone(),
            _ => self.old_id().or(self.new_id()).unwrap_or("").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Classified buckets for one or more category runs.
///
/// Built once per run, merged across categories, sorted, optionally
/// overridden, committed, then dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationResult {
    pub categories: Vec<i32>,
    pub same: Vec<Outcome>,
    pub changed: Vec<Outcome>,
    pub renamed: Vec<Outcome>,
    pub added: Vec<Outcome>,
    pub removed: Vec<Outcome>,
    pub ambiguous: Vec<Outcome>,
    /// Addition candidates dropped by the leading-character sanity check.
    pub rejected: Vec<String>,
    pub actions: ActionTable,
}

impl ReconciliationResult {
    pub fn new(category: i32) -> Self {
        Self {
            categories: vec![category],
            ..Self::default()
        }
    }

    pub fn bucket(&self, bucket: Bucket) -> &[Outcome] {
        match bucket {
            Bucket::Same => &self.same,
            Bucket::Changed => &self.changed,
            Bucket::Renamed => &self.renamed,
            Bucket::Added => &self.added,
            Bucket::Removed => &self.removed,
            Bucket::Ambiguous => &self.ambiguous,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<Outcome> {
        match bucket {
            Bucket::Same => &mut self.same,
            Bucket::Changed => &mut self.changed,
            Bucket::Renamed => &mut self.renamed,
            Bucket::Added => &mut self.added,
            Bucket::Removed => &mut self.removed,
            Bucket::Ambiguous => &mut self.ambiguous,
        }
    }

    pub fn push(&mut self, bucket: Bucket, outcome: Outcome) {
        self.bucket_mut(bucket).push(outcome);
    }

    /// True when nothing needs a decision (only `Same` outcomes, if any).
    pub fn is_empty(&self) -> bool {
        Bucket::COMMIT_ORDER.iter().all(|b| self.bucket(*b).is_empty())
    }

    /// Absorb another run's buckets, rejected ids and overrides.
    pub fn merge(&mut self, other: ReconciliationResult) {
        let ReconciliationResult {
            categories,
            same,
            changed,
            renamed,
            added,
            removed,
            ambiguous,
            rejected,
            actions,
        } = other;
        self.categories.extend(categories);
        self.same.extend(same);
        self.changed.extend(changed);
        self.renamed.extend(renamed);
        self.added.extend(added);
        self.removed.extend(removed);
        self.ambiguous.extend(ambiguous);
        self.rejected.extend(rejected);
        self.actions.merge(actions);
    }

    /// Sort every bucket by action key for deterministic presentation.
    pub fn sort(&mut self) {
        self.categories.sort_unstable();
        self.categories.dedup();
        for bucket in Bucket::ALL {
            self.bucket_mut(bucket)
                .sort_by_cached_key(|o| o.action_key(bucket));
        }
        self.rejected.sort();
    }

    /// Find the outcome stored under `key`, searching buckets in commit order.
    pub fn find(&self, key: &str) -> Option<(Bucket, &Outcome)> {
        Bucket::COMMIT_ORDER.iter().find_map(|bucket| {
            self.bucket(*bucket)
                .iter()
                .find(|o| o.action_key(*bucket) == key)
                .map(|o| (*bucket, o))
        })
    }

    /// Iterate `(bucket, outcome)` across the actionable buckets in commit order.
    pub fn actionable(&self) -> impl Iterator<Item = (Bucket, &Outcome)> {
        Bucket::COMMIT_ORDER
            .into_iter()
            .flat_map(move |b| self.bucket(b).iter().map(move |o| (b, o)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, desc: &str) -> Record {
        Record::from_iter([(field::ID, id), (field::DESCRIPTION, desc)])
    }

    #[test]
    fn field_status_order() {
        assert!(FieldStatus::Unknown < FieldStatus::OnlyInNew);
        assert!(FieldStatus::OnlyInOld < FieldStatus::Unequal);
        assert!(FieldStatus::Unequal < FieldStatus::EqualWithCoercion);
        assert!(FieldStatus::EqualWithCoercion < FieldStatus::Equal);
    }

    #[test]
    fn action_keys() {
        let renamed = Outcome::Renamed {
            old_id: "s1".into(),
            new_id: "s2".into(),
            record: rec("s2", "Foo"),
            diff: FieldDiff::new(),
        };
        assert_eq!(renamed.action_key(Bucket::Renamed), "s1s2");

        let ambiguous = Outcome::Changed {
            id: "Z".into(),
            record: rec("Z", "Bar"),
            diff: FieldDiff::new(),
        };
        assert_eq!(ambiguous.action_key(Bucket::Ambiguous), "ZZ");
        assert_eq!(ambiguous.action_key(Bucket::Changed), "Z");

        let added = Outcome::Added { id: "n1".into(), record: rec("n1", "New") };
        assert_eq!(added.action_key(Bucket::Added), "n1");
        assert_eq!(Outcome::Removed { id: "r1".into() }.action_key(Bucket::Removed), "r1");
    }

    #[test]
    fn merge_and_sort() {
        let mut a = ReconciliationResult::new(2);
        a.push(Bucket::Removed, Outcome::Removed { id: "b".into() });
        let mut b = ReconciliationResult::new(1);
        b.push(Bucket::Removed, Outcome::Removed { id: "a".into() });
        b.rejected.push("-x".into());

        a.merge(b);
        a.sort();
        assert_eq!(a.categories, vec![1, 2]);
        let ids: Vec<_> = a.removed.iter().filter_map(Outcome::old_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(a.rejected, vec!["-x"]);
        assert!(!a.is_empty());
        assert_eq!(a.find("b").map(|(bucket, _)| bucket), Some(Bucket::Removed));
    }

    #[test]
    fn same_only_is_empty() {
        let mut r = ReconciliationResult::new(1);
        r.push(Bucket::Same, Outcome::Same { id: "s1".into() });
        assert!(r.is_empty());
        assert_eq!(r.actionable().count(), 0);
    }
}
