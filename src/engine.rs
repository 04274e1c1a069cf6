//! Engine facade: top-level API for the seshat lineage engine.
//!
//! The `Engine` is the application root: it owns the artifact catalog, the
//! derivation graph, the chain registry, the transformation tracker, the
//! provenance recorder, and the persistence backend, all constructed once
//! at startup. There is no process-wide singleton; callers hold the engine
//! (or an `Arc` of it) and pass it by handle.
//!
//! The public surface is string-facing: writes intern artifact names into
//! ids, reads resolve ids back to names, and unknown names on read paths
//! yield empty results so queries compose without existence checks.
//!
//! Every mutation persists through the [`LineageStore`] before it becomes
//! visible in memory. Startup hydration replays artifacts, relationships,
//! chains, transformations, and provenance from the store before the
//! engine is handed out; the relationship replay enters the graph through
//! a single exclusive `bulk_load`, so no reader ever observes a
//! half-hydrated graph.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::{ArtifactId, ArtifactRecord};
use crate::catalog::ArtifactCatalog;
use crate::chain::{Chain, ChainClass, ChainId, ChainRegistry};
use crate::error::{EngineError, SeshatResult};
use crate::export::{ChainDiagram, DiagramEdge, DiagramNode};
use crate::graph::Relationship;
use crate::graph::analyze::{ChainAnalyzer, ChainStructure};
use crate::graph::query::LineageQueryEngine;
use crate::graph::store::GraphStore;
use crate::metadata::MetaMap;
use crate::provenance::{ProvenanceRecord, ProvenanceRecorder, RecordId};
use crate::store::LineageStore;
use crate::store::durable::DurableStore;
use crate::store::mem::MemoryStore;
use crate::transform::{TransformId, Transformation, TransformationTracker};

/// Configuration for the seshat engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Data directory for persistence. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
    /// Depth ceiling applied to traversals when the caller passes no bound.
    ///
    /// `None` leaves unbounded traversals bounded only by reachable graph
    /// size. On very large graphs this ceiling is the de facto cancellation
    /// mechanism.
    pub max_traversal_depth: Option<usize>,
}

/// The seshat data lineage engine.
pub struct Engine {
    config: EngineConfig,
    catalog: ArtifactCatalog,
    graph: Arc<GraphStore>,
    query: LineageQueryEngine,
    chains: Arc<ChainRegistry>,
    analyzer: ChainAnalyzer,
    tracker: TransformationTracker,
    recorder: ProvenanceRecorder,
    store: Arc<dyn LineageStore>,
}

impl Engine {
    /// Open an engine, hydrating all state from the configured store.
    ///
    /// With a `data_dir` this opens (or creates) the durable redb store;
    /// without one the engine is ephemeral. Rejects configurations that
    /// cannot work: a zero depth ceiling or a data directory path that
    /// names an existing non-directory.
    pub fn open(config: EngineConfig) -> SeshatResult<Self> {
        if config.max_traversal_depth == Some(0) {
            return Err(EngineError::InvalidConfig {
                message: "max_traversal_depth of 0 would empty every unbounded query".into(),
            }
            .into());
        }
        let store: Arc<dyn LineageStore> = match config.data_dir {
            Some(ref dir) => {
                if dir.exists() && !dir.is_dir() {
                    return Err(EngineError::DataDir {
                        path: dir.display().to_string(),
                    }
                    .into());
                }
                Arc::new(DurableStore::open(dir)?)
            }
            None => Arc::new(MemoryStore::new()),
        };

        let catalog = ArtifactCatalog::new();
        let graph = Arc::new(GraphStore::new());
        let query = LineageQueryEngine::new(Arc::clone(&graph));
        let chains = Arc::new(ChainRegistry::new(Arc::clone(&store)));
        let analyzer = ChainAnalyzer::new(Arc::clone(&graph), Arc::clone(&chains));
        let tracker = TransformationTracker::new(Arc::clone(&store));
        let recorder = ProvenanceRecorder::new(Arc::clone(&store));

        for artifact in store.list_artifacts()? {
            catalog.register(artifact);
        }
        let rels = store.list_relationships()?;
        // One write-lock acquisition for the whole replay.
        let edges = graph.bulk_load(&rels);
        for chain in store.list_chains()? {
            chains.register(chain);
        }
        for transformation in store.list_transformations()? {
            tracker.register(transformation);
        }
        for record in store.list_all_provenance_records()? {
            recorder.register(record);
        }

        tracing::info!(
            artifacts = catalog.len(),
            edges,
            chains = chains.len(),
            transformations = tracker.len(),
            provenance = recorder.len(),
            persistent = config.data_dir.is_some(),
            "seshat engine hydrated"
        );

        Ok(Self {
            config,
            catalog,
            graph,
            query,
            chains,
            analyzer,
            tracker,
            recorder,
            store,
        })
    }

    /// Intern an artifact name, persisting the identity record when new.
    fn intern(&self, name: &str) -> SeshatResult<ArtifactId> {
        if let Some(id) = self.catalog.resolve(name) {
            return Ok(id);
        }
        let record = self.catalog.mint(name)?;
        self.store.upsert_artifact(&record)?;
        Ok(self.catalog.register(record))
    }

    fn intern_all(&self, names: &[&str]) -> SeshatResult<Vec<ArtifactId>> {
        names.iter().map(|name| self.intern(name)).collect()
    }

    fn names_of(&self, ids: impl IntoIterator<Item = ArtifactId>) -> HashSet<String> {
        ids.into_iter().map(|id| self.catalog.resolve_name(id)).collect()
    }

    // ------------------------------------------------------------------
    // Graph
    // ------------------------------------------------------------------

    /// Record that `child` was derived from `parent`.
    ///
    /// Interns both names, persists the edge, then publishes it to the
    /// graph. Re-adding the same (parent, child) pair overwrites kind,
    /// weight, and metadata; cycles are accepted and surface in analysis.
    pub fn add_relationship(
        &self,
        parent: &str,
        child: &str,
        kind: &str,
        weight: f64,
        metadata: MetaMap,
    ) -> SeshatResult<Relationship> {
        let parent = self.intern(parent)?;
        let child = self.intern(child)?;
        let rel = Relationship::new(parent, child, kind)
            .with_weight(weight)
            .with_metadata(metadata);
        self.store.upsert_relationship(&rel)?;
        self.graph.add_relationship(&rel);
        tracing::debug!(parent = %parent, child = %child, kind, "added relationship");
        Ok(rel)
    }

    /// Transitive upstream closure of an artifact, by name.
    ///
    /// `max_depth` counts hops; when absent, the configured ceiling (if
    /// any) applies. Unknown names yield an empty set.
    pub fn ancestors(&self, node: &str, max_depth: Option<usize>) -> HashSet<String> {
        let Some(id) = self.catalog.resolve(node) else {
            return HashSet::new();
        };
        let depth = max_depth.or(self.config.max_traversal_depth);
        self.names_of(self.query.ancestors(id, depth))
    }

    /// Transitive downstream closure of an artifact, by name.
    pub fn descendants(&self, node: &str, max_depth: Option<usize>) -> HashSet<String> {
        let Some(id) = self.catalog.resolve(node) else {
            return HashSet::new();
        };
        let depth = max_depth.or(self.config.max_traversal_depth);
        self.names_of(self.query.descendants(id, depth))
    }

    /// Artifacts upstream of every one of the given names.
    ///
    /// An empty list is a caller error; an unknown name makes the
    /// intersection empty.
    pub fn common_ancestors(&self, nodes: &[&str]) -> SeshatResult<HashSet<String>> {
        if nodes.is_empty() {
            return Err(crate::error::QueryError::EmptyNodeList.into());
        }
        let mut ids = Vec::with_capacity(nodes.len());
        for name in nodes {
            match self.catalog.resolve(name) {
                Some(id) => ids.push(id),
                // An unknown seed has no ancestors.
                None => return Ok(HashSet::new()),
            }
        }
        let common = self.query.common_ancestors(&ids)?;
        Ok(self.names_of(common))
    }

    /// Shortest derivation path between two artifacts, by hop count.
    pub fn path_between(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let source = self.catalog.resolve(source)?;
        let target = self.catalog.resolve(target)?;
        let path = self.query.path(source, target)?;
        Some(path.into_iter().map(|id| self.catalog.resolve_name(id)).collect())
    }

    // ------------------------------------------------------------------
    // Chains
    // ------------------------------------------------------------------

    /// Create a chain anchored at the given root artifact names.
    pub fn create_chain(
        &self,
        name: &str,
        roots: &[&str],
        metadata: MetaMap,
    ) -> SeshatResult<Chain> {
        let roots = self.intern_all(roots)?;
        self.chains.create(name, &roots, metadata)
    }

    /// Fetch a chain, erroring when unknown.
    pub fn get_chain(&self, id: ChainId) -> SeshatResult<Chain> {
        self.chains.get(id)
    }

    /// Add artifacts to a chain's membership snapshot.
    pub fn extend_chain(&self, id: ChainId, nodes: &[&str]) -> SeshatResult<Chain> {
        let nodes = self.intern_all(nodes)?;
        self.chains.extend(id, &nodes)
    }

    /// Replace a chain's advisory leaf declaration.
    pub fn set_chain_leaves(&self, id: ChainId, leaves: &[&str]) -> SeshatResult<Chain> {
        let leaves = self.intern_all(leaves)?;
        self.chains.set_leaf_nodes(id, &leaves)
    }

    /// Replace a chain's declared classification.
    pub fn reclassify_chain(&self, id: ChainId, class: ChainClass) -> SeshatResult<Chain> {
        self.chains.set_class(id, class)
    }

    /// All chains, sorted by id.
    pub fn list_chains(&self) -> Vec<Chain> {
        self.chains.list()
    }

    /// Structural metrics for a chain's induced subgraph.
    ///
    /// Unknown chains yield the empty structure, mirroring traversal
    /// query ergonomics.
    pub fn analyze_chain(&self, id: ChainId) -> ChainStructure {
        self.analyzer.analyze(id)
    }

    /// Renderer-neutral export of a chain's induced subgraph.
    ///
    /// A direct lookup, so an unknown chain errors.
    pub fn chain_diagram(&self, id: ChainId) -> SeshatResult<ChainDiagram> {
        let chain = self.chains.get(id)?;
        let sub = self.graph.induced(chain.all_nodes.iter().copied());

        let leaves: HashSet<ArtifactId> = sub
            .node_indices()
            .filter(|&idx| sub.neighbors(idx).next().is_none())
            .filter_map(|idx| sub.node_weight(idx).copied())
            .collect();
        let roots: HashSet<ArtifactId> = chain.root_nodes.iter().copied().collect();

        let mut nodes: Vec<DiagramNode> = chain
            .all_nodes
            .iter()
            .map(|&id| DiagramNode {
                id: id.get(),
                name: self.catalog.resolve_name(id),
                root: roots.contains(&id),
                leaf: leaves.contains(&id),
            })
            .collect();
        nodes.sort_by_key(|n| n.id);

        let mut edges: Vec<DiagramEdge> = sub
            .edge_indices()
            .filter_map(|ei| {
                let (src, dst) = sub.edge_endpoints(ei)?;
                let attrs = sub.edge_weight(ei)?;
                Some(DiagramEdge {
                    source: sub.node_weight(src)?.get(),
                    target: sub.node_weight(dst)?.get(),
                    kind: attrs.kind.clone(),
                    weight: attrs.weight,
                })
            })
            .collect();
        edges.sort_by_key(|e| (e.source, e.target));

        Ok(ChainDiagram {
            chain: chain.id.get(),
            name: chain.name,
            nodes,
            edges,
        })
    }

    // ------------------------------------------------------------------
    // Transformations
    // ------------------------------------------------------------------

    /// Declare a transformation over the given input artifact names.
    ///
    /// When a chain is given it must exist; the declaration starts in
    /// `pending` and does not touch the graph.
    pub fn declare_transformation(
        &self,
        name: &str,
        inputs: &[&str],
        function: &str,
        parameters: MetaMap,
        chain: Option<ChainId>,
        metadata: MetaMap,
    ) -> SeshatResult<Transformation> {
        if let Some(chain) = chain {
            self.chains.get(chain)?;
        }
        let inputs = self.intern_all(inputs)?;
        self.tracker.create(name, &inputs, function, parameters, chain, metadata)
    }

    /// Mark a pending transformation as started.
    pub fn begin_transformation(&self, id: TransformId) -> SeshatResult<Transformation> {
        self.tracker.begin(id)
    }

    /// Record successful execution producing the named output artifact.
    ///
    /// Records the outcome only; derivation edges are the caller's to add
    /// (or use [`Engine::apply_transformation`] for the combined step).
    pub fn execute_transformation(
        &self,
        id: TransformId,
        output: &str,
    ) -> SeshatResult<Transformation> {
        let output = self.intern(output)?;
        self.tracker.execute(id, output)
    }

    /// Record successful execution and wire input → output edges in one
    /// call.
    ///
    /// Each edge carries the transformation's function as its kind and a
    /// `transformation` metadata entry with the transform id. The outcome
    /// is recorded first; a persist failure on a later edge leaves the
    /// earlier edges in place and propagates.
    pub fn apply_transformation(
        &self,
        id: TransformId,
        output: &str,
    ) -> SeshatResult<Transformation> {
        let output = self.intern(output)?;
        let done = self.tracker.execute(id, output)?;
        let metadata =
            crate::metadata::meta_map([("transformation", done.id.get() as i64)]);
        for &input in &done.inputs {
            let rel = Relationship::new(input, output, &done.function)
                .with_metadata(metadata.clone());
            self.store.upsert_relationship(&rel)?;
            self.graph.add_relationship(&rel);
        }
        Ok(done)
    }

    /// Record failed execution with an error message.
    pub fn fail_transformation(&self, id: TransformId, message: &str) -> SeshatResult<Transformation> {
        self.tracker.fail(id, message)
    }

    /// Explicitly undo a transformation.
    pub fn rollback_transformation(&self, id: TransformId) -> SeshatResult<Transformation> {
        self.tracker.rollback(id)
    }

    /// Fetch a transformation, erroring when unknown.
    pub fn get_transformation(&self, id: TransformId) -> SeshatResult<Transformation> {
        self.tracker.get(id)
    }

    /// All transformations, sorted by id.
    pub fn transformations(&self) -> Vec<Transformation> {
        self.tracker.list()
    }

    /// All transformations belonging to a chain, sorted by id.
    pub fn transformations_for_chain(&self, chain: ChainId) -> Vec<Transformation> {
        self.tracker.for_chain(chain)
    }

    // ------------------------------------------------------------------
    // Provenance
    // ------------------------------------------------------------------

    /// Append a provenance record for the named artifact.
    pub fn record_provenance(
        &self,
        node: &str,
        kind: &str,
        source_system: &str,
        transformations: Vec<TransformId>,
        quality_metrics: BTreeMap<String, f64>,
    ) -> SeshatResult<RecordId> {
        let node = self.intern(node)?;
        self.recorder
            .record(node, kind, source_system, transformations, quality_metrics)
    }

    /// Provenance history for an artifact, newest first.
    pub fn provenance_of(&self, node: &str) -> Vec<ProvenanceRecord> {
        match self.catalog.resolve(node) {
            Some(id) => self.recorder.history(id),
            None => Vec::new(),
        }
    }

    /// Most recent provenance record for an artifact.
    pub fn latest_provenance(&self, node: &str) -> Option<ProvenanceRecord> {
        self.recorder.latest(self.catalog.resolve(node)?)
    }

    // ------------------------------------------------------------------
    // Artifacts & introspection
    // ------------------------------------------------------------------

    /// Resolve an artifact name to its id.
    pub fn artifact_id(&self, name: &str) -> Option<ArtifactId> {
        self.catalog.resolve(name)
    }

    /// Resolve an artifact id to a name, falling back to `art:{id}`.
    pub fn artifact_name(&self, id: ArtifactId) -> String {
        self.catalog.resolve_name(id)
    }

    /// Whether a name has ever been referenced.
    pub fn contains_artifact(&self, name: &str) -> bool {
        self.catalog.contains_name(name)
    }

    /// All registered artifacts.
    pub fn artifacts(&self) -> Vec<ArtifactRecord> {
        self.catalog.all()
    }

    /// Get the shared graph handle.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Summary counters for the engine state.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            artifacts: self.catalog.len(),
            graph_nodes: self.graph.node_count(),
            graph_edges: self.graph.edge_count(),
            chains: self.chains.len(),
            transformations: self.tracker.len(),
            provenance_records: self.recorder.len(),
            persistent: self.config.data_dir.is_some(),
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub artifacts: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub chains: usize,
    pub transformations: usize,
    pub provenance_records: usize,
    pub persistent: bool,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "seshat engine info")?;
        writeln!(f, "  artifacts:       {}", self.artifacts)?;
        writeln!(f, "  graph nodes:     {}", self.graph_nodes)?;
        writeln!(f, "  graph edges:     {}", self.graph_edges)?;
        writeln!(f, "  chains:          {}", self.chains)?;
        writeln!(f, "  transformations: {}", self.transformations)?;
        writeln!(f, "  provenance:      {}", self.provenance_records)?;
        writeln!(f, "  persistent:      {}", self.persistent)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("graph", &self.graph)
            .finish()
    }
}
