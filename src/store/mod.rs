//! Persistence layer for the lineage engine.
//!
//! Two backends implement the same [`LineageStore`] contract:
//!
//! - [`mem::MemoryStore`] — concurrent hashmaps (DashMap), no durability
//! - [`durable::DurableStore`] — ACID transactions (redb)
//!
//! The engine writes through the store *before* publishing to in-memory
//! structures, so a store that returns an error must leave no partial
//! state behind: each call is a single atomic unit.

pub mod durable;
pub mod mem;

use crate::artifact::{ArtifactId, ArtifactRecord};
use crate::chain::{Chain, ChainId};
use crate::error::StoreError;
use crate::graph::Relationship;
use crate::provenance::ProvenanceRecord;
use crate::transform::{TransformId, TransformStatus, Transformation};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable record of everything the engine must survive a restart with.
///
/// Upserts are keyed on the record's own id (relationships on their
/// (parent, child) pair), so replaying a write is harmless. `list_*`
/// methods return rows in ascending key order.
pub trait LineageStore: Send + Sync {
    /// Write or overwrite an artifact identity record.
    fn upsert_artifact(&self, artifact: &ArtifactRecord) -> StoreResult<()>;

    /// All artifact records.
    fn list_artifacts(&self) -> StoreResult<Vec<ArtifactRecord>>;

    /// Write or overwrite a derivation edge.
    fn upsert_relationship(&self, rel: &Relationship) -> StoreResult<()>;

    /// All derivation edges.
    fn list_relationships(&self) -> StoreResult<Vec<Relationship>>;

    /// Write or overwrite a chain snapshot.
    fn upsert_chain(&self, chain: &Chain) -> StoreResult<()>;

    /// One chain by id.
    fn get_chain(&self, id: ChainId) -> StoreResult<Option<Chain>>;

    /// All chains.
    fn list_chains(&self) -> StoreResult<Vec<Chain>>;

    /// Write or overwrite a transformation record.
    fn upsert_transformation(&self, transformation: &Transformation) -> StoreResult<()>;

    /// Overwrite the mutable tail of an existing transformation record.
    ///
    /// Errors with [`StoreError::NotFound`] when the row does not exist;
    /// the immutable declaration fields are untouched.
    fn update_transformation_status(
        &self,
        id: TransformId,
        status: TransformStatus,
        output: Option<ArtifactId>,
        executed_at: Option<u64>,
        duration_ms: Option<u64>,
        error_message: Option<String>,
    ) -> StoreResult<()>;

    /// All transformation records.
    fn list_transformations(&self) -> StoreResult<Vec<Transformation>>;

    /// Append a provenance record. Records are immutable once written.
    fn insert_provenance_record(&self, record: &ProvenanceRecord) -> StoreResult<()>;

    /// All provenance records for a node, ascending by record id.
    fn list_provenance_records(&self, node: ArtifactId) -> StoreResult<Vec<ProvenanceRecord>>;

    /// Every provenance record, grouped by node and ascending by record id
    /// within each node. Used for hydration.
    fn list_all_provenance_records(&self) -> StoreResult<Vec<ProvenanceRecord>>;
}
