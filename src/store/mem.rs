//! Memory-only lineage store.
//!
//! Backs ephemeral engines (and most tests): the same write-through
//! contract as the durable store, with nothing surviving a restart.

use dashmap::DashMap;

use crate::artifact::{ArtifactId, ArtifactRecord};
use crate::chain::{Chain, ChainId};
use crate::error::StoreError;
use crate::graph::Relationship;
use crate::provenance::ProvenanceRecord;
use crate::transform::{TransformId, TransformStatus, Transformation};

use super::{LineageStore, StoreResult};

/// Concurrent in-memory implementation of [`LineageStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: DashMap<ArtifactId, ArtifactRecord>,
    relationships: DashMap<(ArtifactId, ArtifactId), Relationship>,
    chains: DashMap<ChainId, Chain>,
    transformations: DashMap<TransformId, Transformation>,
    provenance: DashMap<ArtifactId, Vec<ProvenanceRecord>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineageStore for MemoryStore {
    fn upsert_artifact(&self, artifact: &ArtifactRecord) -> StoreResult<()> {
        self.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    fn list_artifacts(&self) -> StoreResult<Vec<ArtifactRecord>> {
        let mut rows: Vec<ArtifactRecord> =
            self.artifacts.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    fn upsert_relationship(&self, rel: &Relationship) -> StoreResult<()> {
        self.relationships
            .insert((rel.parent, rel.child), rel.clone());
        Ok(())
    }

    fn list_relationships(&self) -> StoreResult<Vec<Relationship>> {
        let mut rows: Vec<Relationship> =
            self.relationships.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|r| (r.parent, r.child));
        Ok(rows)
    }

    fn upsert_chain(&self, chain: &Chain) -> StoreResult<()> {
        self.chains.insert(chain.id, chain.clone());
        Ok(())
    }

    fn get_chain(&self, id: ChainId) -> StoreResult<Option<Chain>> {
        Ok(self.chains.get(&id).map(|r| r.value().clone()))
    }

    fn list_chains(&self) -> StoreResult<Vec<Chain>> {
        let mut rows: Vec<Chain> = self.chains.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    fn upsert_transformation(&self, transformation: &Transformation) -> StoreResult<()> {
        self.transformations
            .insert(transformation.id, transformation.clone());
        Ok(())
    }

    fn update_transformation_status(
        &self,
        id: TransformId,
        status: TransformStatus,
        output: Option<ArtifactId>,
        executed_at: Option<u64>,
        duration_ms: Option<u64>,
        error_message: Option<String>,
    ) -> StoreResult<()> {
        let mut row = self
            .transformations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                key: format!("tx:{}", id.get()),
            })?;
        row.status = status;
        row.output = output;
        row.executed_at = executed_at;
        row.duration_ms = duration_ms;
        row.error_message = error_message;
        Ok(())
    }

    fn list_transformations(&self) -> StoreResult<Vec<Transformation>> {
        let mut rows: Vec<Transformation> = self
            .transformations
            .iter()
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    fn insert_provenance_record(&self, record: &ProvenanceRecord) -> StoreResult<()> {
        self.provenance
            .entry(record.node)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn list_provenance_records(&self, node: ArtifactId) -> StoreResult<Vec<ProvenanceRecord>> {
        let mut rows = self
            .provenance
            .get(&node)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        rows.sort_by_key(|p| p.id);
        Ok(rows)
    }

    fn list_all_provenance_records(&self) -> StoreResult<Vec<ProvenanceRecord>> {
        let mut rows: Vec<ProvenanceRecord> = self
            .provenance
            .iter()
            .flat_map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|p| (p.node, p.id));
        Ok(rows)
    }
}
