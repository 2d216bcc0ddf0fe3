use std::collections::{BTreeMap, BTreeSet};

use crate::compare::{compare_records, is_equal, key_field_differs};
use crate::config::FieldNames;
use crate::model::{FieldDiff, Outcome, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Old => "persisted",
            Side::New => "live",
        }
    }
}

/// Index a snapshot by id. Later duplicates and id-less records are logged and dropped.
pub fn index_snapshot<'a>(
    records: &'a [Record],
    id_field: &str,
    side: Side,
) -> BTreeMap<String, &'a Record> {
    let mut index = BTreeMap::new();
    for (row, record) in records.iter().enumerate() {
        let id = record.value(id_field);
        if id.is_empty() {
            tracing::warn!("{} row {row}: no '{id_field}' value, skipped", side.as_str());
            continue;
        }
        if index.contains_key(id) {
            tracing::warn!(
                "{} row {row}: duplicate id {id:?}, keeping first occurrence",
                side.as_str()
            );
            continue;
        }
        index.insert(id.to_string(), record);
    }
    index
}

/// Output of the id-matching pass.
#[derive(Debug, Default)]
pub struct PhaseOne {
    pub same: Vec<Outcome>,
    pub changed: Vec<Outcome>,
    /// Ids present on both sides whose key field changed, with their diff.
    pub deferred: BTreeMap<String, FieldDiff>,
    /// New ids not settled by id (includes deferred ids).
    pub added: BTreeSet<String>,
    /// Old ids not settled by id (includes deferred ids).
    pub deleted: BTreeSet<String>,
}

/// Classify every id present on both sides as same, changed or deferred.
pub fn classify_common(
    old: &BTreeMap<String, &Record>,
    new: &BTreeMap<String, &Record>,
    fields: &FieldNames,
) -> PhaseOne {
    let mut out = PhaseOne::default();
    let mut common: BTreeSet<&str> = BTreeSet::new();

    for (id, old_rec) in old {
        let Some(new_rec) = new.get(id) else {
            continue;
        };
        let diff = compare_records(old_rec, new_rec, &fields.ignored);
        if is_equal(&diff, false) {
            out.same.push(Outcome::Same { id: id.clone() });
            common.insert(id);
        } else if key_field_differs(&diff, &fields.key) {
            tracing::debug!("id {id:?}: description changed, deferring to rename analysis");
            out.deferred.insert(id.clone(), diff);
        } else {
            out.changed.push(Outcome::Changed {
                id: id.clone(),
                record: (*new_rec).clone(),
                diff,
            });
            common.insert(id);
        }
    }

    out.added = new
        .keys()
        .filter(|id| !common.contains(id.as_str()))
        .cloned()
        .collect();
    out.deleted = old
        .keys()
        .filter(|id| !common.contains(id.as_str()))
        .cloned()
        .collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field;

    fn rec(id: &str, desc: &str, price: &str) -> Record {
        Record::from_iter([(field::ID, id), (field::DESCRIPTION, desc), ("price1", price)])
    }

    #[test]
    fn duplicates_keep_first() {
        let records = vec![
            rec("s1", "first", "1"),
            rec("s1", "second", "2"),
            rec("", "blank", "3"),
        ];
        let index = index_snapshot(&records, field::ID, Side::New);
        assert_eq!(index.len(), 1);
        assert_eq!(index["s1"].value(field::DESCRIPTION), "first");
    }

    #[test]
    fn same_changed_deferred() {
        let old = vec![
            rec("s1", "Foo", "10"),
            rec("s2", "Bar", "5"),
            rec("s3", "Baz", "7"),
            rec("s4", "Gone", "1"),
        ];
        let new = vec![
            rec("s1", "Foo", "10.0"),
            rec("s2", "Bar", "6"),
            rec("s3", "Baz v2", "7"),
            rec("s5", "Fresh", "2"),
        ];
        let fields = FieldNames::default();
        let oi = index_snapshot(&old, &fields.id, Side::Old);
        let ni = index_snapshot(&new, &fields.id, Side::New);
        let p = classify_common(&oi, &ni, &fields);

        assert_eq!(p.same, vec![Outcome::Same { id: "s1".into() }]);
        assert_eq!(p.changed.len(), 1);
        assert_eq!(p.changed[0].old_id(), Some("s2"));
        assert!(p.deferred.contains_key("s3"));

        let added: Vec<_> = p.added.iter().map(String::as_str).collect();
        let deleted: Vec<_> = p.deleted.iter().map(String::as_str).collect();
        assert_eq!(added, vec!["s3", "s5"]);
        assert_eq!(deleted, vec!["s3", "s4"]);
    }
}
