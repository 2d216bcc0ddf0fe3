//! Persisted catalog seen through the narrow interface the committer needs.

use serde::{Deserialize, Serialize};

use crate::config::FieldNames;
use crate::error::ReconError;
use crate::model::Record;

/// Mutations and lookups the committer performs against persisted storage.
///
/// Ids are the store's primary identity. Implementations own their durability:
/// nothing is expected to persist until [`CatalogStore::save`].
pub trait CatalogStore {
    /// Exported record for `id`.
    fn record(&self, id: &str) -> Option<Record>;

    fn contains(&self, id: &str) -> bool {
        self.record(id).is_some()
    }

    /// Number of persisted entities; also the next sequence number.
    fn count(&self) -> usize;

    /// All records whose category field equals `category`, in sequence order.
    fn records_in_category(&self, category: i32) -> Vec<Record>;

    fn insert(&mut self, sequence: usize, record: Record) -> Result<(), ReconError>;

    /// Overwrite the fields in `changes`. A changed id relinks references.
    fn update(&mut self, id: &str, changes: &Record) -> Result<(), ReconError>;

    fn remove(&mut self, id: &str) -> Result<(), ReconError>;

    /// How many other persisted records refer to `id`.
    fn reference_count(&self, id: &str) -> usize;

    fn save(&mut self) -> Result<(), ReconError>;
}

/// True when the exclusion marker parses as a negative number.
pub fn is_excluded(record: &Record, exclusion_field: &str) -> bool {
    record
        .get(exclusion_field)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .is_some_and(|marker| marker < 0)
}

/// The persisted snapshot of one category, minus pre-excluded records.
pub fn comparable_records<S: CatalogStore + ?Sized>(
    store: &S,
    category: i32,
    fields: &FieldNames,
) -> Vec<Record> {
    store
        .records_in_category(category)
        .into_iter()
        .filter(|r| !is_excluded(r, &fields.exclusion))
        .collect()
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub sequence: usize,
    pub fields: Record,
}

/// An inventory-style record pointing at a catalog id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub from: String,
    pub to: String,
}

/// Serde-friendly store kept entirely in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub fields: FieldNames,
    #[serde(default)]
    pub entities: Vec<CatalogEntity>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(skip)]
    saves: usize,
}

impl MemoryStore {
    pub fn new(fields: FieldNames) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Build a store from records, numbering them in order.
    pub fn with_records(fields: FieldNames, records: impl IntoIterator<Item = Record>) -> Self {
        let entities = records
            .into_iter()
            .enumerate()
            .map(|(sequence, fields)| CatalogEntity { sequence, fields })
            .collect();
        Self {
            fields,
            entities,
            ..Self::default()
        }
    }

    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::Store(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| ReconError::Store(e.to_string()))
    }

    pub fn add_reference(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.references.push(Reference {
            from: from.into(),
            to: to.into(),
        });
    }

    /// Number of successful `save()` calls since construction.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entities
            .iter()
            .position(|e| e.fields.value(&self.fields.id) == id)
    }

    fn category_of(&self, record: &Record) -> Option<i32> {
        record.get(&self.fields.category)?.trim().parse().ok()
    }
}

impl CatalogStore for MemoryStore {
    fn record(&self, id: &str) -> Option<Record> {
        self.position(id).map(|i| self.entities[i].fields.clone())
    }

    fn count(&self) -> usize {
        self.entities.len()
    }

    fn records_in_category(&self, category: i32) -> Vec<Record> {
        let mut matching: Vec<&CatalogEntity> = self
            .entities
            .iter()
            .filter(|e| self.category_of(&e.fields) == Some(category))
            .collect();
        matching.sort_by_key(|e| e.sequence);
        matching.into_iter().map(|e| e.fields.clone()).collect()
    }

    fn insert(&mut self, sequence: usize, record: Record) -> Result<(), ReconError> {
        let id = record.value(&self.fields.id);
        if id.is_empty() {
            return Err(ReconError::Store("cannot insert a record without an id".into()));
        }
        if self.position(id).is_some() {
            return Err(ReconError::Store(format!("id {id:?} already exists")));
        }
        self.entities.push(CatalogEntity {
            sequence,
            fields: record,
        });
        Ok(())
    }

    fn update(&mut self, id: &str, changes: &Record) -> Result<(), ReconError> {
        let index = self
            .position(id)
            .ok_or_else(|| ReconError::Store(format!("no record with id {id:?}")))?;

        if let Some(new_id) = changes.get(&self.fields.id) {
            if new_id != id && self.position(new_id).is_some() {
                return Err(ReconError::Store(format!("id {new_id:?} already exists")));
            }
            if new_id != id {
                for r in self.references.iter_mut().filter(|r| r.to == id) {
                    r.to = new_id.to_string();
                }
            }
        }

        self.entities[index].fields.merge_from(changes);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<(), ReconError> {
        let index = self
            .position(id)
            .ok_or_else(|| ReconError::Store(format!("no record with id {id:?}")))?;
        self.entities.remove(index);
        Ok(())
    }

    fn reference_count(&self, id: &str) -> usize {
        self.references.iter().filter(|r| r.to == id).count()
    }

    fn save(&mut self) -> Result<(), ReconError> {
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field;

    fn rec(id: &str, cat: &str, pictype: &str) -> Record {
        Record::from_iter([
            (field::ID, id),
            (field::CATEGORY, cat),
            (field::PICTYPE, pictype),
        ])
    }

    fn store() -> MemoryStore {
        MemoryStore::with_records(
            FieldNames::default(),
            [rec("a", "2", "0"), rec("b", "2", "-1"), rec("c", "3", "1"), rec("d", "2", "")],
        )
    }

    #[test]
    fn exclusion_marker() {
        assert!(is_excluded(&rec("x", "1", "-2"), field::PICTYPE));
        assert!(!is_excluded(&rec("x", "1", "0"), field::PICTYPE));
        assert!(!is_excluded(&rec("x", "1", ""), field::PICTYPE));
        assert!(!is_excluded(&Record::new(), field::PICTYPE));
    }

    #[test]
    fn comparable_filters_category_and_exclusions() {
        let s = store();
        let ids: Vec<_> = comparable_records(&s, 2, &s.fields)
            .iter()
            .map(|r| r.value(field::ID).to_string())
            .collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn update_relinks_references() {
        let mut s = store();
        s.add_reference("inv1", "a");
        s.update("a", &Record::from_iter([(field::ID, "z")])).unwrap();
        assert!(s.contains("z"));
        assert!(!s.contains("a"));
        assert_eq!(s.reference_count("z"), 1);
        assert_eq!(s.reference_count("a"), 0);
    }

    #[test]
    fn update_refuses_id_collision() {
        let mut s = store();
        let err = s.update("a", &Record::from_iter([(field::ID, "c")])).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn insert_and_remove() {
        let mut s = store();
        assert!(s.insert(4, rec("a", "2", "0")).is_err());
        s.insert(4, rec("e", "2", "0")).unwrap();
        assert_eq!(s.count(), 5);
        s.remove("e").unwrap();
        assert!(s.remove("e").is_err());
    }

    #[test]
    fn json_round_trip_keeps_references() {
        let mut s = store();
        s.add_reference("inv1", "c");
        let back = MemoryStore::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(back.entities, s.entities);
        assert_eq!(back.reference_count("c"), 1);
    }
}
