//! Transformation tracking: declared pipeline steps and their execution
//! lifecycle.
//!
//! A transformation is declared up front with its input artifacts and
//! logical function, then moves through a small state machine:
//!
//! ```text
//! pending ──> in-progress ──> completed
//!    │             │     └──> failed
//!    └─────────────┴──────────> (either outcome directly)
//! ```
//!
//! `rolled-back` is reachable from every state except itself, and only via
//! an explicit [`TransformationTracker::rollback`]. Terminal records are
//! immutable: re-executing one is rejected and its recorded output survives.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, IdAllocator, now_millis};
use crate::chain::ChainId;
use crate::error::{SeshatResult, TransformError};
use crate::metadata::MetaMap;
use crate::store::LineageStore;

/// Unique, niche-optimized identifier for a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TransformId(std::num::NonZeroU64);

impl TransformId {
    /// Create a `TransformId` from a raw `u64`. Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        std::num::NonZeroU64::new(raw).map(TransformId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for TransformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// Lifecycle state of a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformStatus {
    /// Declared but not yet started.
    Pending,
    /// Execution has begun.
    InProgress,
    /// Finished successfully; output artifact recorded.
    Completed,
    /// Finished unsuccessfully; error message recorded.
    Failed,
    /// Explicitly undone.
    RolledBack,
}

impl TransformStatus {
    /// Whether this state is final. Terminal records never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransformStatus::Completed | TransformStatus::Failed | TransformStatus::RolledBack
        )
    }
}

impl std::fmt::Display for TransformStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformStatus::Pending => write!(f, "pending"),
            TransformStatus::InProgress => write!(f, "in-progress"),
            TransformStatus::Completed => write!(f, "completed"),
            TransformStatus::Failed => write!(f, "failed"),
            TransformStatus::RolledBack => write!(f, "rolled-back"),
        }
    }
}

/// A declared pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformation {
    /// Unique identifier.
    pub id: TransformId,
    /// Human-readable step name.
    pub name: String,
    /// Input artifacts this step reads. Never empty.
    pub inputs: Vec<ArtifactId>,
    /// Output artifact, recorded on successful execution.
    pub output: Option<ArtifactId>,
    /// Logical function applied (e.g. "dedupe", "join", "train").
    pub function: String,
    /// Function parameters as declared.
    pub parameters: MetaMap,
    /// Current lifecycle state.
    pub status: TransformStatus,
    /// Owning chain, if this step belongs to one.
    pub chain: Option<ChainId>,
    /// When the step was declared (milliseconds since UNIX epoch).
    pub created_at: u64,
    /// When execution completed successfully.
    pub executed_at: Option<u64>,
    /// Wall-clock duration from declaration to successful completion.
    pub duration_ms: Option<u64>,
    /// Failure detail, recorded when the step fails.
    pub error_message: Option<String>,
    /// Free-form annotations.
    pub metadata: MetaMap,
}

/// Tracker for transformation lifecycles.
///
/// Every status change persists through the [`LineageStore`] before it
/// becomes visible in memory, so a failed write leaves the tracker
/// unchanged.
pub struct TransformationTracker {
    transforms: DashMap<TransformId, Transformation>,
    allocator: IdAllocator,
    store: Arc<dyn LineageStore>,
}

impl TransformationTracker {
    /// Create a tracker backed by the given store.
    pub fn new(store: Arc<dyn LineageStore>) -> Self {
        Self {
            transforms: DashMap::new(),
            allocator: IdAllocator::new(),
            store,
        }
    }

    /// Declare a new transformation in `pending` state.
    ///
    /// Requires at least one input artifact.
    pub fn create(
        &self,
        name: &str,
        inputs: &[ArtifactId],
        function: &str,
        parameters: MetaMap,
        chain: Option<ChainId>,
        metadata: MetaMap,
    ) -> SeshatResult<Transformation> {
        if inputs.is_empty() {
            return Err(TransformError::EmptyInputs.into());
        }
        let id = TransformId(self.allocator.next_raw()?);
        let transformation = Transformation {
            id,
            name: name.to_owned(),
            inputs: inputs.to_vec(),
            output: None,
            function: function.to_owned(),
            parameters,
            status: TransformStatus::Pending,
            chain,
            created_at: now_millis(),
            executed_at: None,
            duration_ms: None,
            error_message: None,
            metadata,
        };
        self.store.upsert_transformation(&transformation)?;
        self.transforms.insert(id, transformation.clone());
        tracing::debug!(transform = %id, name, function, "declared transformation");
        Ok(transformation)
    }

    /// Mark a pending transformation as started.
    ///
    /// Optional instrumentation: [`TransformationTracker::execute`] accepts
    /// pending steps directly.
    pub fn begin(&self, id: TransformId) -> SeshatResult<Transformation> {
        let current = self.get(id)?;
        if current.status.is_terminal() {
            return Err(terminal(id, current.status).into());
        }
        if current.status != TransformStatus::Pending {
            return Err(TransformError::InvalidTransition {
                transform_id: id.get(),
                from: current.status.to_string(),
                to: TransformStatus::InProgress.to_string(),
            }
            .into());
        }
        self.commit(current, |t| {
            t.status = TransformStatus::InProgress;
        })
    }

    /// Record successful execution, producing `output`.
    ///
    /// Stamps `executed_at` and the declaration-to-completion duration.
    /// Terminal records are rejected with their output untouched.
    pub fn execute(&self, id: TransformId, output: ArtifactId) -> SeshatResult<Transformation> {
        let current = self.get(id)?;
        if current.status.is_terminal() {
            return Err(terminal(id, current.status).into());
        }
        let executed_at = now_millis();
        self.commit(current, |t| {
            t.status = TransformStatus::Completed;
            t.output = Some(output);
            t.executed_at = Some(executed_at);
            t.duration_ms = Some(executed_at.saturating_sub(t.created_at));
        })
    }

    /// Record failed execution with an error message.
    pub fn fail(&self, id: TransformId, message: &str) -> SeshatResult<Transformation> {
        let current = self.get(id)?;
        if current.status.is_terminal() {
            return Err(terminal(id, current.status).into());
        }
        let message = message.to_owned();
        self.commit(current, |t| {
            t.status = TransformStatus::Failed;
            t.error_message = Some(message);
        })
    }

    /// Explicitly undo a transformation.
    ///
    /// Allowed from every state except `rolled-back`; a completed step keeps
    /// its recorded output as history.
    pub fn rollback(&self, id: TransformId) -> SeshatResult<Transformation> {
        let current = self.get(id)?;
        if current.status == TransformStatus::RolledBack {
            return Err(TransformError::InvalidTransition {
                transform_id: id.get(),
                from: current.status.to_string(),
                to: TransformStatus::RolledBack.to_string(),
            }
            .into());
        }
        self.commit(current, |t| {
            t.status = TransformStatus::RolledBack;
        })
    }

    /// Persist a status change, then publish it to memory.
    fn commit(
        &self,
        mut transformation: Transformation,
        apply: impl FnOnce(&mut Transformation),
    ) -> SeshatResult<Transformation> {
        apply(&mut transformation);
        self.store.update_transformation_status(
            transformation.id,
            transformation.status,
            transformation.output,
            transformation.executed_at,
            transformation.duration_ms,
            transformation.error_message.clone(),
        )?;
        self.transforms
            .insert(transformation.id, transformation.clone());
        tracing::debug!(
            transform = %transformation.id,
            status = %transformation.status,
            "transformation status changed"
        );
        Ok(transformation)
    }

    /// Fetch a transformation, erroring when unknown.
    pub fn get(&self, id: TransformId) -> SeshatResult<Transformation> {
        self.lookup(id)
            .ok_or_else(|| TransformError::NotFound { transform_id: id.get() }.into())
    }

    /// Fetch a transformation, `None` when unknown.
    pub fn lookup(&self, id: TransformId) -> Option<Transformation> {
        self.transforms.get(&id).map(|r| r.value().clone())
    }

    /// All transformations, sorted by id.
    pub fn list(&self) -> Vec<Transformation> {
        let mut all: Vec<Transformation> =
            self.transforms.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|t| t.id);
        all
    }

    /// All transformations belonging to a chain, sorted by id.
    pub fn for_chain(&self, chain: ChainId) -> Vec<Transformation> {
        let mut matching: Vec<Transformation> = self
            .transforms
            .iter()
            .filter(|r| r.value().chain == Some(chain))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by_key(|t| t.id);
        matching
    }

    /// Number of tracked transformations.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the tracker is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Insert an already-persisted transformation. Used during hydration.
    pub fn register(&self, transformation: Transformation) {
        self.allocator.advance_past(transformation.id.get());
        self.transforms.insert(transformation.id, transformation);
    }
}

fn terminal(id: TransformId, status: TransformStatus) -> TransformError {
    TransformError::AlreadyTerminal {
        transform_id: id.get(),
        status: status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SeshatError;
    use crate::store::mem::MemoryStore;

    fn art(id: u64) -> ArtifactId {
        ArtifactId::new(id).unwrap()
    }

    fn tracker() -> TransformationTracker {
        TransformationTracker::new(Arc::new(MemoryStore::new()))
    }

    fn declare(tracker: &TransformationTracker) -> Transformation {
        tracker
            .create(
                "dedupe-orders",
                &[art(1), art(2)],
                "dedupe",
                MetaMap::new(),
                None,
                MetaMap::new(),
            )
            .unwrap()
    }

    #[test]
    fn create_starts_pending() {
        let tracker = tracker();
        let t = declare(&tracker);
        assert_eq!(t.status, TransformStatus::Pending);
        assert!(t.output.is_none());
        assert!(t.executed_at.is_none());
    }

    #[test]
    fn create_rejects_empty_inputs() {
        let tracker = tracker();
        let err = tracker
            .create("noop", &[], "id", MetaMap::new(), None, MetaMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            SeshatError::Transform(TransformError::EmptyInputs)
        ));
    }

    #[test]
    fn full_lifecycle_stamps_execution() {
        let tracker = tracker();
        let t = declare(&tracker);
        let started = tracker.begin(t.id).unwrap();
        assert_eq!(started.status, TransformStatus::InProgress);

        let done = tracker.execute(t.id, art(9)).unwrap();
        assert_eq!(done.status, TransformStatus::Completed);
        assert_eq!(done.output, Some(art(9)));
        assert!(done.executed_at.unwrap() >= done.created_at);
        assert!(done.duration_ms.is_some());
    }

    #[test]
    fn execute_accepts_pending_directly() {
        let tracker = tracker();
        let t = declare(&tracker);
        let done = tracker.execute(t.id, art(9)).unwrap();
        assert_eq!(done.status, TransformStatus::Completed);
    }

    #[test]
    fn terminal_records_are_immutable() {
        let tracker = tracker();
        let t = declare(&tracker);
        tracker.execute(t.id, art(9)).unwrap();

        let err = tracker.execute(t.id, art(10)).unwrap_err();
        assert!(matches!(
            err,
            SeshatError::Transform(TransformError::AlreadyTerminal { .. })
        ));
        // The original output survives the rejected re-run.
        assert_eq!(tracker.get(t.id).unwrap().output, Some(art(9)));

        assert!(tracker.begin(t.id).is_err());
        assert!(tracker.fail(t.id, "late").is_err());
    }

    #[test]
    fn fail_records_message_without_execution_stamp() {
        let tracker = tracker();
        let t = declare(&tracker);
        let failed = tracker.fail(t.id, "upstream schema drift").unwrap();
        assert_eq!(failed.status, TransformStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("upstream schema drift"));
        assert!(failed.executed_at.is_none());
    }

    #[test]
    fn rollback_preserves_completed_output() {
        let tracker = tracker();
        let t = declare(&tracker);
        tracker.execute(t.id, art(9)).unwrap();
        let rolled = tracker.rollback(t.id).unwrap();
        assert_eq!(rolled.status, TransformStatus::RolledBack);
        assert_eq!(rolled.output, Some(art(9)));
    }

    #[test]
    fn rollback_is_allowed_from_pending_but_not_twice() {
        let tracker = tracker();
        let t = declare(&tracker);
        tracker.rollback(t.id).unwrap();
        let err = tracker.rollback(t.id).unwrap_err();
        assert!(matches!(
            err,
            SeshatError::Transform(TransformError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn begin_twice_is_an_invalid_transition() {
        let tracker = tracker();
        let t = declare(&tracker);
        tracker.begin(t.id).unwrap();
        let err = tracker.begin(t.id).unwrap_err();
        assert!(matches!(
            err,
            SeshatError::Transform(TransformError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn unknown_transformation_errors() {
        let tracker = tracker();
        let missing = TransformId::new(404).unwrap();
        assert!(matches!(
            tracker.get(missing),
            Err(SeshatError::Transform(TransformError::NotFound { transform_id: 404 }))
        ));
    }

    #[test]
    fn for_chain_filters_and_sorts() {
        let tracker = tracker();
        let chain = ChainId::new(7).unwrap();
        let other = ChainId::new(8).unwrap();
        for (name, owner) in [("a", Some(chain)), ("b", Some(other)), ("c", Some(chain))] {
            tracker
                .create(name, &[art(1)], "f", MetaMap::new(), owner, MetaMap::new())
                .unwrap();
        }
        let in_chain = tracker.for_chain(chain);
        assert_eq!(in_chain.len(), 2);
        assert!(in_chain.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn status_changes_are_persisted_through_the_store() {
        let store = Arc::new(MemoryStore::new());
        let tracker = TransformationTracker::new(Arc::clone(&store) as Arc<dyn LineageStore>);
        let t = declare(&tracker);
        tracker.execute(t.id, art(9)).unwrap();

        let rows = store.list_transformations().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TransformStatus::Completed);
        assert_eq!(rows[0].output, Some(art(9)));
    }

    #[test]
    fn register_resumes_the_id_allocator() {
        let tracker = tracker();
        let mut restored = declare(&tracker);
        restored.id = TransformId::new(50).unwrap();
        tracker.register(restored);
        let fresh = declare(&tracker);
        assert!(fresh.id.get() > 50);
    }
}
