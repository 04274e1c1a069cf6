//! Persistence and recovery tests for the seshat engine.
//!
//! These tests verify that artifacts, relationships, chains,
//! transformations, and provenance survive an engine restart (write +
//! reopen cycle), that id allocators resume past hydrated ids, and that
//! the persist-then-memory ordering leaves memory untouched when the
//! store rejects a write.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use seshat::artifact::{ArtifactId, ArtifactRecord};
use seshat::chain::{Chain, ChainId, ChainRegistry};
use seshat::engine::{Engine, EngineConfig};
use seshat::error::StoreError;
use seshat::graph::Relationship;
use seshat::metadata::MetaMap;
use seshat::provenance::ProvenanceRecord;
use seshat::store::{LineageStore, StoreResult};
use seshat::transform::{
    TransformId, TransformStatus, Transformation, TransformationTracker,
};

fn persistent_engine(dir: &std::path::Path) -> Engine {
    Engine::open(EngineConfig {
        data_dir: Some(dir.to_path_buf()),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn lineage_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: build a small pipeline.
    {
        let engine = persistent_engine(dir.path());
        engine
            .add_relationship("raw.events", "clean.events", "derived-from", 1.0, MetaMap::new())
            .unwrap();
        engine
            .add_relationship("clean.events", "report", "aggregated-from", 0.5, MetaMap::new())
            .unwrap();
    }

    // Second session: the graph is rebuilt from the store.
    {
        let engine = persistent_engine(dir.path());
        let info = engine.info();
        assert_eq!(info.artifacts, 3);
        assert_eq!(info.graph_edges, 2);
        assert!(info.persistent);

        assert!(engine.contains_artifact("raw.events"));
        assert!(engine.descendants("raw.events", None).contains("report"));
        assert_eq!(
            engine.path_between("raw.events", "report").unwrap(),
            vec!["raw.events", "clean.events", "report"]
        );
    }
}

#[test]
fn chains_and_transformations_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    let (chain_id, transform_id);
    {
        let engine = persistent_engine(dir.path());
        let chain = engine.create_chain("nightly", &["raw"], MetaMap::new()).unwrap();
        engine.extend_chain(chain.id, &["clean"]).unwrap();
        chain_id = chain.id;

        let t = engine
            .declare_transformation(
                "clean-step",
                &["raw"],
                "dedupe",
                MetaMap::new(),
                Some(chain.id),
                MetaMap::new(),
            )
            .unwrap();
        engine.apply_transformation(t.id, "clean").unwrap();
        transform_id = t.id;
    }

    {
        let engine = persistent_engine(dir.path());
        let chain = engine.get_chain(chain_id).unwrap();
        assert_eq!(chain.name, "nightly");
        assert_eq!(chain.len(), 2);

        let t = engine.get_transformation(transform_id).unwrap();
        assert_eq!(t.status, TransformStatus::Completed);
        assert_eq!(t.output, engine.artifact_id("clean"));
        assert_eq!(t.chain, Some(chain_id));

        // Terminal protection holds across the restart.
        assert!(engine.execute_transformation(transform_id, "other").is_err());

        // The edge wired by apply_transformation is back too.
        let s = engine.analyze_chain(chain_id);
        assert_eq!(s.total_edges, 1);
    }
}

#[test]
fn provenance_history_survives_restart_newest_first() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let engine = persistent_engine(dir.path());
        for kind in ["ingestion", "validation", "transformation"] {
            engine
                .record_provenance("clean", kind, "s3", vec![], BTreeMap::new())
                .unwrap();
        }
    }

    {
        let engine = persistent_engine(dir.path());
        let history = engine.provenance_of("clean");
        assert_eq!(history.len(), 3);
        let kinds: Vec<&str> = history.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["transformation", "validation", "ingestion"]);
        assert_eq!(engine.latest_provenance("clean").unwrap().kind, "transformation");
    }
}

#[test]
fn allocators_resume_after_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    let (max_artifact, chain_before, transform_before);
    {
        let engine = persistent_engine(dir.path());
        engine
            .add_relationship("alpha", "beta", "derived-from", 1.0, MetaMap::new())
            .unwrap();
        max_artifact = engine.artifact_id("beta").unwrap();
        chain_before = engine.create_chain("one", &["alpha"], MetaMap::new()).unwrap().id;
        transform_before = engine
            .declare_transformation("t", &["alpha"], "f", MetaMap::new(), None, MetaMap::new())
            .unwrap()
            .id;
    }

    {
        let engine = persistent_engine(dir.path());
        engine
            .add_relationship("beta", "gamma", "derived-from", 1.0, MetaMap::new())
            .unwrap();
        assert!(engine.artifact_id("gamma").unwrap() > max_artifact);
        // Hydration keeps the old mapping stable.
        assert_eq!(engine.artifact_id("beta"), Some(max_artifact));

        let chain = engine.create_chain("two", &["beta"], MetaMap::new()).unwrap();
        assert!(chain.id.get() > chain_before.get());
        let t = engine
            .declare_transformation("u", &["beta"], "g", MetaMap::new(), None, MetaMap::new())
            .unwrap();
        assert!(t.id.get() > transform_before.get());
    }
}

// ---------------------------------------------------------------------------
// Persist-then-memory ordering
// ---------------------------------------------------------------------------

/// Store double that rejects every write once armed.
#[derive(Default)]
struct FailingStore {
    fail: AtomicBool,
}

impl FailingStore {
    fn arm(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Backend {
                message: "injected failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl LineageStore for FailingStore {
    fn upsert_artifact(&self, _: &ArtifactRecord) -> StoreResult<()> {
        self.check()
    }
    fn list_artifacts(&self) -> StoreResult<Vec<ArtifactRecord>> {
        Ok(vec![])
    }
    fn upsert_relationship(&self, _: &Relationship) -> StoreResult<()> {
        self.check()
    }
    fn list_relationships(&self) -> StoreResult<Vec<Relationship>> {
        Ok(vec![])
    }
    fn upsert_chain(&self, _: &Chain) -> StoreResult<()> {
        self.check()
    }
    fn get_chain(&self, _: ChainId) -> StoreResult<Option<Chain>> {
        Ok(None)
    }
    fn list_chains(&self) -> StoreResult<Vec<Chain>> {
        Ok(vec![])
    }
    fn upsert_transformation(&self, _: &Transformation) -> StoreResult<()> {
        self.check()
    }
    fn update_transformation_status(
        &self,
        _: TransformId,
        _: TransformStatus,
        _: Option<ArtifactId>,
        _: Option<u64>,
        _: Option<u64>,
        _: Option<String>,
    ) -> StoreResult<()> {
        self.check()
    }
    fn list_transformations(&self) -> StoreResult<Vec<Transformation>> {
        Ok(vec![])
    }
    fn insert_provenance_record(&self, _: &ProvenanceRecord) -> StoreResult<()> {
        self.check()
    }
    fn list_provenance_records(&self, _: ArtifactId) -> StoreResult<Vec<ProvenanceRecord>> {
        Ok(vec![])
    }
    fn list_all_provenance_records(&self) -> StoreResult<Vec<ProvenanceRecord>> {
        Ok(vec![])
    }
}

fn art(id: u64) -> ArtifactId {
    ArtifactId::new(id).unwrap()
}

#[test]
fn failed_chain_persist_leaves_registry_unchanged() {
    let store = Arc::new(FailingStore::default());
    let registry = ChainRegistry::new(Arc::clone(&store) as Arc<dyn LineageStore>);

    let chain = registry.create("ok", &[art(1)], MetaMap::new()).unwrap();
    store.arm();

    assert!(registry.create("doomed", &[art(2)], MetaMap::new()).is_err());
    assert_eq!(registry.len(), 1);

    // A failed update leaves the existing chain as it was.
    assert!(registry.extend(chain.id, &[art(3)]).is_err());
    assert_eq!(registry.get(chain.id).unwrap().len(), 1);
}

#[test]
fn failed_status_persist_leaves_transformation_unchanged() {
    let store = Arc::new(FailingStore::default());
    let tracker = TransformationTracker::new(Arc::clone(&store) as Arc<dyn LineageStore>);

    let t = tracker
        .create("step", &[art(1)], "f", MetaMap::new(), None, MetaMap::new())
        .unwrap();
    store.arm();

    assert!(tracker.execute(t.id, art(9)).is_err());
    let kept = tracker.get(t.id).unwrap();
    assert_eq!(kept.status, TransformStatus::Pending);
    assert!(kept.output.is_none());

    // Once the store recovers, the transformation is still executable.
    store.fail.store(false, Ordering::SeqCst);
    assert_eq!(
        tracker.execute(t.id, art(9)).unwrap().status,
        TransformStatus::Completed
    );
}
