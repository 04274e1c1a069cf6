//! ACID-durable lineage store backed by redb.
//!
//! One table per record family, keyed by id so upserts replace in place:
//!
//! - `artifacts`:        id → bincode [`ArtifactRecord`]
//! - `relationships`:    (parent, child) → bincode [`Relationship`]
//! - `chains`:           id → bincode [`Chain`]
//! - `transformations`:  id → bincode [`Transformation`]
//! - `provenance`:       (node, record id) → bincode [`ProvenanceRecord`]
//!
//! All writes go through transactions; reads use MVCC snapshots. The
//! composite provenance key makes a per-node history a contiguous range.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::artifact::{ArtifactId, ArtifactRecord};
use crate::chain::{Chain, ChainId};
use crate::error::StoreError;
use crate::graph::Relationship;
use crate::provenance::ProvenanceRecord;
use crate::transform::{TransformId, TransformStatus, Transformation};

use super::{LineageStore, StoreResult};

const ARTIFACTS: TableDefinition<u64, &[u8]> = TableDefinition::new("artifacts");
const RELATIONSHIPS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("relationships");
const CHAINS: TableDefinition<u64, &[u8]> = TableDefinition::new("chains");
const TRANSFORMATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("transformations");
const PROVENANCE: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("provenance");

/// Name of the database file inside the data directory.
pub const DB_FILE: &str = "seshat.redb";

/// ACID-durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    ///
    /// All tables are created up front so reads on a fresh database see
    /// empty tables instead of missing ones.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Backend {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        let txn = db.begin_write().map_err(backend("begin_write"))?;
        {
            txn.open_table(ARTIFACTS).map_err(backend("open_table"))?;
            txn.open_table(RELATIONSHIPS).map_err(backend("open_table"))?;
            txn.open_table(CHAINS).map_err(backend("open_table"))?;
            txn.open_table(TRANSFORMATIONS).map_err(backend("open_table"))?;
            txn.open_table(PROVENANCE).map_err(backend("open_table"))?;
        }
        txn.commit().map_err(backend("commit"))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl LineageStore for DurableStore {
    fn upsert_artifact(&self, artifact: &ArtifactRecord) -> StoreResult<()> {
        let bytes = encode(artifact)?;
        let txn = self.db.begin_write().map_err(backend("begin_write"))?;
        {
            let mut table = txn.open_table(ARTIFACTS).map_err(backend("open_table"))?;
            table
                .insert(artifact.id.get(), bytes.as_slice())
                .map_err(backend("insert"))?;
        }
        txn.commit().map_err(backend("commit"))
    }

    fn list_artifacts(&self) -> StoreResult<Vec<ArtifactRecord>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn.open_table(ARTIFACTS).map_err(backend("open_table"))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(backend("iter"))? {
            let (_, value) = entry.map_err(backend("iter"))?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    fn upsert_relationship(&self, rel: &Relationship) -> StoreResult<()> {
        let bytes = encode(rel)?;
        let txn = self.db.begin_write().map_err(backend("begin_write"))?;
        {
            let mut table = txn
                .open_table(RELATIONSHIPS)
                .map_err(backend("open_table"))?;
            table
                .insert((rel.parent.get(), rel.child.get()), bytes.as_slice())
                .map_err(backend("insert"))?;
        }
        txn.commit().map_err(backend("commit"))
    }

    fn list_relationships(&self) -> StoreResult<Vec<Relationship>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn
            .open_table(RELATIONSHIPS)
            .map_err(backend("open_table"))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(backend("iter"))? {
            let (_, value) = entry.map_err(backend("iter"))?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    fn upsert_chain(&self, chain: &Chain) -> StoreResult<()> {
        let bytes = encode(chain)?;
        let txn = self.db.begin_write().map_err(backend("begin_write"))?;
        {
            let mut table = txn.open_table(CHAINS).map_err(backend("open_table"))?;
            table
                .insert(chain.id.get(), bytes.as_slice())
                .map_err(backend("insert"))?;
        }
        txn.commit().map_err(backend("commit"))
    }

    fn get_chain(&self, id: ChainId) -> StoreResult<Option<Chain>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn.open_table(CHAINS).map_err(backend("open_table"))?;
        let row = table.get(id.get()).map_err(backend("get"))?;
        row.map(|guard| decode(guard.value())).transpose()
    }

    fn list_chains(&self) -> StoreResult<Vec<Chain>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn.open_table(CHAINS).map_err(backend("open_table"))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(backend("iter"))? {
            let (_, value) = entry.map_err(backend("iter"))?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    fn upsert_transformation(&self, transformation: &Transformation) -> StoreResult<()> {
        let bytes = encode(transformation)?;
        let txn = self.db.begin_write().map_err(backend("begin_write"))?;
        {
            let mut table = txn
                .open_table(TRANSFORMATIONS)
                .map_err(backend("open_table"))?;
            table
                .insert(transformation.id.get(), bytes.as_slice())
                .map_err(backend("insert"))?;
        }
        txn.commit().map_err(backend("commit"))
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
        let txn = self.db.begin_write().map_err(backend("begin_write"))?;
        {
            let mut table = txn
                .open_table(TRANSFORMATIONS)
                .map_err(backend("open_table"))?;
            let existing = table
                .get(id.get())
                .map_err(backend("get"))?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| StoreError::NotFound {
                    key: format!("tx:{}", id.get()),
                })?;
            let mut row: Transformation = decode(&existing)?;
            row.status = status;
            row.output = output;
            row.executed_at = executed_at;
            row.duration_ms = duration_ms;
            row.error_message = error_message;
            let bytes = encode(&row)?;
            table
                .insert(id.get(), bytes.as_slice())
                .map_err(backend("insert"))?;
        }
        txn.commit().map_err(backend("commit"))
    }

    fn list_transformations(&self) -> StoreResult<Vec<Transformation>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn
            .open_table(TRANSFORMATIONS)
            .map_err(backend("open_table"))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(backend("iter"))? {
            let (_, value) = entry.map_err(backend("iter"))?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    fn insert_provenance_record(&self, record: &ProvenanceRecord) -> StoreResult<()> {
        let bytes = encode(record)?;
        let txn = self.db.begin_write().map_err(backend("begin_write"))?;
        {
            let mut table = txn.open_table(PROVENANCE).map_err(backend("open_table"))?;
            table
                .insert((record.node.get(), record.id.get()), bytes.as_slice())
                .map_err(backend("insert"))?;
        }
        txn.commit().map_err(backend("commit"))
    }

    fn list_provenance_records(&self, node: ArtifactId) -> StoreResult<Vec<ProvenanceRecord>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn.open_table(PROVENANCE).map_err(backend("open_table"))?;
        let range = table
            .range((node.get(), u64::MIN)..=(node.get(), u64::MAX))
            .map_err(backend("range"))?;
        let mut rows = Vec::new();
        for entry in range {
            let (_, value) = entry.map_err(backend("range"))?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    fn list_all_provenance_records(&self) -> StoreResult<Vec<ProvenanceRecord>> {
        let txn = self.db.begin_read().map_err(backend("begin_read"))?;
        let table = txn.open_table(PROVENANCE).map_err(backend("open_table"))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(backend("iter"))? {
            let (_, value) = entry.map_err(backend("iter"))?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

fn backend<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::Backend {
        message: format!("{op} failed: {e}"),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        message: format!("failed to serialize record: {e}"),
    })
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize record: {e}"),
    })
}
