//! JSON store file backing the catalog during a CLI run.

use std::path::{Path, PathBuf};

use stampbook_recon::{CatalogStore, FieldNames, MemoryStore, ReconError, Record};

/// A [`MemoryStore`] loaded from, and saved back to, one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Load `path`. The config's field names win over any stored in the file.
    pub fn open(path: &Path, fields: &FieldNames) -> Result<Self, ReconError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        let mut inner = MemoryStore::from_json(&text)
            .map_err(|e| ReconError::Store(format!("{}: {e}", path.display())))?;
        inner.fields = fields.clone();
        tracing::info!(
            "loaded {} catalog entities from {}",
            inner.entities.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogStore for JsonFileStore {
    fn record(&self, id: &str) -> Option<Record> {
        self.inner.record(id)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn records_in_category(&self, category: i32) -> Vec<Record> {
        self.inner.records_in_category(category)
    }

    fn insert(&mut self, sequence: usize, record: Record) -> Result<(), ReconError> {
        self.inner.insert(sequence, record)
    }

    fn update(&mut self, id: &str, changes: &Record) -> Result<(), ReconError> {
        self.inner.update(id, changes)
    }

    fn remove(&mut self, id: &str) -> Result<(), ReconError> {
        self.inner.remove(id)
    }

    fn reference_count(&self, id: &str) -> usize {
        self.inner.reference_count(id)
    }

    /// Write to a sibling temp file, then rename over the original.
    fn save(&mut self) -> Result<(), ReconError> {
        let json = self.inner.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| ReconError::Io(format!("cannot write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ReconError::Io(format!("cannot replace {}: {e}", self.path.display())))?;
        self.inner.save()?;
        tracing::info!("saved {}", self.path.display());
        Ok(())
    }
}
