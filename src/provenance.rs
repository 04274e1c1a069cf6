//! Provenance ledger: the audit trail of where each artifact came from.
//!
//! Every ingestion, transformation run, validation, or manual correction
//! appends a [`ProvenanceRecord`] to the affected artifact's history.
//! Records are immutable once written and are retrieved newest-first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, IdAllocator, now_millis};
use crate::error::SeshatResult;
use crate::store::LineageStore;
use crate::transform::TransformId;

/// Unique, niche-optimized identifier for a provenance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RecordId(std::num::NonZeroU64);

impl RecordId {
    /// Create a `RecordId` from a raw `u64`. Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        std::num::NonZeroU64::new(raw).map(RecordId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prov:{}", self.0)
    }
}

/// A single provenance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Unique identifier, monotone across the whole ledger.
    pub id: RecordId,
    /// The artifact this record describes.
    pub node: ArtifactId,
    /// Provenance kind (e.g. "ingestion", "transformation", "validation").
    pub kind: String,
    /// External system that produced the data.
    pub source_system: String,
    /// When the source produced the data (milliseconds since UNIX epoch).
    pub source_timestamp: u64,
    /// Transformations that contributed to this state of the artifact.
    pub transformations: Vec<TransformId>,
    /// Named quality measurements (completeness, accuracy, ...).
    pub quality_metrics: BTreeMap<String, f64>,
    /// When the record was written.
    pub created_at: u64,
}

/// Append-only provenance recorder with a per-node in-memory history.
///
/// Appends persist through the [`LineageStore`] before they become visible
/// in memory. Histories are kept in ascending record order internally and
/// reversed on read, so [`ProvenanceRecorder::latest`] is O(1).
pub struct ProvenanceRecorder {
    by_node: DashMap<ArtifactId, Vec<ProvenanceRecord>>,
    total: AtomicUsize,
    allocator: IdAllocator,
    store: Arc<dyn LineageStore>,
}

impl ProvenanceRecorder {
    /// Create a recorder backed by the given store.
    pub fn new(store: Arc<dyn LineageStore>) -> Self {
        Self {
            by_node: DashMap::new(),
            total: AtomicUsize::new(0),
            allocator: IdAllocator::new(),
            store,
        }
    }

    /// Append a provenance record for `node`.
    ///
    /// `source_timestamp` and `created_at` are both stamped now; callers
    /// with an earlier source time record it in `quality_metrics` or a
    /// dedicated ingestion record.
    pub fn record(
        &self,
        node: ArtifactId,
        kind: &str,
        source_system: &str,
        transformations: Vec<TransformId>,
        quality_metrics: BTreeMap<String, f64>,
    ) -> SeshatResult<RecordId> {
        let id = RecordId(self.allocator.next_raw()?);
        let now = now_millis();
        let record = ProvenanceRecord {
            id,
            node,
            kind: kind.to_owned(),
            source_system: source_system.to_owned(),
            source_timestamp: now,
            transformations,
            quality_metrics,
            created_at: now,
        };
        self.store.insert_provenance_record(&record)?;
        self.by_node.entry(node).or_default().push(record);
        self.total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(record = %id, node = %node, kind, "recorded provenance");
        Ok(id)
    }

    /// Full history for a node, newest first. Unknown nodes yield an empty vec.
    pub fn history(&self, node: ArtifactId) -> Vec<ProvenanceRecord> {
        self.by_node
            .get(&node)
            .map(|r| r.value().iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent record for a node.
    pub fn latest(&self, node: ArtifactId) -> Option<ProvenanceRecord> {
        self.by_node.get(&node).and_then(|r| r.value().last().cloned())
    }

    /// Total number of records across all nodes.
    pub fn len(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an already-persisted record. Used during hydration.
    ///
    /// Callers feed records in ascending id order per node, matching the
    /// order the store returns them in.
    pub fn register(&self, record: ProvenanceRecord) {
        self.allocator.advance_past(record.id.get());
        self.by_node.entry(record.node).or_default().push(record);
        self.total.fetch_add(1, Ordering::Relaxed);
    }
}
