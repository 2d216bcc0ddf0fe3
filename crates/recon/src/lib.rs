//! `stampbook-recon`: catalog snapshot reconciliation engine.
//!
//! Pure engine crate: receives a persisted and a live snapshot of catalog
//! records, classifies every record into disjoint buckets, and commits the
//! reviewed outcome back through the [`CatalogStore`] trait.
//! No CLI or file IO dependencies.

pub mod actions;
pub mod ambiguity;
pub mod classify;
pub mod commit;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod source;
pub mod store;
pub mod summary;

pub use actions::ActionTable;
pub use commit::{CommitReport, Committer};
pub use config::{CommitMode, FieldNames, ReconConfig, RenamePolicy};
pub use engine::{reconcile, reconcile_store};
pub use error::ReconError;
pub use model::{
    Bucket, CommitAction, FieldDiff, FieldStatus, Outcome, Record, ReconciliationResult,
};
pub use source::{SourceCategory, SourceItem};
pub use store::{CatalogStore, MemoryStore};
pub use summary::{compute_summary, ReconReport, ReconSummary};
