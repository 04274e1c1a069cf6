//! In-memory lineage graph storage.
//!
//! Uses `petgraph` for the graph structure with an id → node-index map kept
//! under the same lock, so a writer publishes each edge atomically: readers
//! either see both endpoints and the edge, or nothing of it.
//!
//! Edges are upserts keyed on (parent, child). Re-adding an existing pair
//! replaces the attributes in place and never duplicates the edge, which
//! keeps replayed pipeline runs idempotent. Cycles are accepted; whether a
//! chain is a DAG is a question for analysis, not a write-time constraint.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::artifact::ArtifactId;

use super::{Relationship, RelationshipAttrs};

struct GraphInner {
    /// The directed graph: nodes are ArtifactIds, edges carry attributes.
    graph: DiGraph<ArtifactId, RelationshipAttrs>,
    /// ArtifactId → NodeIndex mapping for O(1) node lookups.
    index: HashMap<ArtifactId, NodeIndex>,
}

impl GraphInner {
    fn ensure_node(&mut self, id: ArtifactId) -> NodeIndex {
        if let Some(idx) = self.index.get(&id) {
            return *idx;
        }
        let idx = self.graph.add_node(id);
        self.index.insert(id, idx);
        idx
    }
}

/// In-memory derivation graph backed by petgraph.
///
/// All mutation goes through [`GraphStore::add_relationship`] (or the
/// hydration-time [`GraphStore::bulk_load`]); reads take a shared lock and
/// return owned values, so no caller ever holds graph internals across
/// a lock boundary.
pub struct GraphStore {
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner {
                graph: DiGraph::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Insert or update a derivation edge.
    ///
    /// Creates nodes for parent and child if they don't exist. An existing
    /// (parent, child) edge has its attributes replaced; node and edge
    /// counts are unchanged by a repeat insert.
    pub fn add_relationship(&self, rel: &Relationship) {
        let mut inner = self.inner.write().expect("graph lock poisoned");
        let parent_idx = inner.ensure_node(rel.parent);
        let child_idx = inner.ensure_node(rel.child);
        inner
            .graph
            .update_edge(parent_idx, child_idx, RelationshipAttrs::from(rel));
    }

    /// Bulk-load relationships under a single write lock.
    ///
    /// Used for restoring from persistent storage. Returns the number of
    /// relationships loaded.
    pub fn bulk_load(&self, rels: &[Relationship]) -> usize {
        let mut inner = self.inner.write().expect("graph lock poisoned");
        for rel in rels {
            let parent_idx = inner.ensure_node(rel.parent);
            let child_idx = inner.ensure_node(rel.child);
            inner
                .graph
                .update_edge(parent_idx, child_idx, RelationshipAttrs::from(rel));
        }
        rels.len()
    }

    /// Check if a node exists.
    pub fn contains(&self, id: ArtifactId) -> bool {
        let inner = self.inner.read().expect("graph lock poisoned");
        inner.index.contains_key(&id)
    }

    /// Direct parents of a node. Unknown nodes yield an empty set.
    pub fn parents(&self, id: ArtifactId) -> HashSet<ArtifactId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct children of a node. Unknown nodes yield an empty set.
    pub fn children(&self, id: ArtifactId) -> HashSet<ArtifactId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: ArtifactId, dir: Direction) -> HashSet<ArtifactId> {
        let inner = self.inner.read().expect("graph lock poisoned");
        let Some(idx) = inner.index.get(&id) else {
            return HashSet::new();
        };
        inner
            .graph
            .neighbors_directed(*idx, dir)
            .filter_map(|n| inner.graph.node_weight(n).copied())
            .collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        let inner = self.inner.read().expect("graph lock poisoned");
        inner.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        let inner = self.inner.read().expect("graph lock poisoned");
        inner.graph.edge_count()
    }

    /// All relationships in the graph.
    pub fn relationships(&self) -> Vec<Relationship> {
        let inner = self.inner.read().expect("graph lock poisoned");
        inner
            .graph
            .edge_indices()
            .filter_map(|ei| {
                let (src, dst) = inner.graph.edge_endpoints(ei)?;
                Some(Self::materialize(
                    *inner.graph.node_weight(src)?,
                    *inner.graph.node_weight(dst)?,
                    inner.graph.edge_weight(ei)?,
                ))
            })
            .collect()
    }

    /// All relationships where the given artifact is the parent.
    pub fn relationships_from(&self, parent: ArtifactId) -> Vec<Relationship> {
        let inner = self.inner.read().expect("graph lock poisoned");
        let Some(idx) = inner.index.get(&parent) else {
            return vec![];
        };
        inner
            .graph
            .edges_directed(*idx, Direction::Outgoing)
            .filter_map(|e| {
                let child = *inner.graph.node_weight(e.target())?;
                Some(Self::materialize(parent, child, e.weight()))
            })
            .collect()
    }

    /// All relationships where the given artifact is the child.
    pub fn relationships_to(&self, child: ArtifactId) -> Vec<Relationship> {
        let inner = self.inner.read().expect("graph lock poisoned");
        let Some(idx) = inner.index.get(&child) else {
            return vec![];
        };
        inner
            .graph
            .edges_directed(*idx, Direction::Incoming)
            .filter_map(|e| {
                let parent = *inner.graph.node_weight(e.source())?;
                Some(Self::materialize(parent, child, e.weight()))
            })
            .collect()
    }

    /// Snapshot the subgraph induced by a node set.
    ///
    /// Returns a detached graph containing every member node and every edge
    /// whose endpoints are both members. Members the graph has never seen
    /// appear as isolated nodes. Analysis and diagram export work on this
    /// snapshot without holding the lock.
    pub fn induced(
        &self,
        members: impl IntoIterator<Item = ArtifactId>,
    ) -> DiGraph<ArtifactId, RelationshipAttrs> {
        let inner = self.inner.read().expect("graph lock poisoned");
        let mut sub = DiGraph::new();
        let mut map: HashMap<ArtifactId, NodeIndex> = HashMap::new();
        for id in members {
            map.entry(id).or_insert_with(|| sub.add_node(id));
        }
        for ei in inner.graph.edge_indices() {
            let Some((src, dst)) = inner.graph.edge_endpoints(ei) else {
                continue;
            };
            let (Some(&parent), Some(&child)) = (
                inner.graph.node_weight(src),
                inner.graph.node_weight(dst),
            ) else {
                continue;
            };
            if let (Some(&a), Some(&b)) = (map.get(&parent), map.get(&child)) {
                if let Some(attrs) = inner.graph.edge_weight(ei) {
                    sub.add_edge(a, b, attrs.clone());
                }
            }
        }
        sub
    }

    fn materialize(parent: ArtifactId, child: ArtifactId, attrs: &RelationshipAttrs) -> Relationship {
        Relationship {
            parent,
            child,
            kind: attrs.kind.clone(),
            weight: attrs.weight,
            timestamp: attrs.timestamp,
            metadata: attrs.metadata.clone(),
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art(id: u64) -> ArtifactId {
        ArtifactId::new(id).unwrap()
    }

    #[test]
    fn insert_and_query() {
        let store = GraphStore::new();
        store.add_relationship(&Relationship::new(art(1), art(2), "derived-from"));

        assert!(store.contains(art(1)));
        assert!(store.contains(art(2)));
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.children(art(1)), HashSet::from([art(2)]));
        assert_eq!(store.parents(art(2)), HashSet::from([art(1)]));
    }

    #[test]
    fn repeat_insert_is_idempotent() {
        let store = GraphStore::new();
        let rel = Relationship::new(art(1), art(2), "derived-from");
        store.add_relationship(&rel);
        store.add_relationship(&rel);
        store.add_relationship(&rel);

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn upsert_replaces_attributes() {
        let store = GraphStore::new();
        store.add_relationship(&Relationship::new(art(1), art(2), "derived-from"));
        store.add_relationship(
            &Relationship::new(art(1), art(2), "aggregated-from").with_weight(0.25),
        );

        let rels = store.relationships_from(art(1));
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].kind, "aggregated-from");
        assert_eq!(rels[0].weight, 0.25);
    }

    #[test]
    fn opposite_direction_is_a_distinct_edge() {
        let store = GraphStore::new();
        store.add_relationship(&Relationship::new(art(1), art(2), "derived-from"));
        store.add_relationship(&Relationship::new(art(2), art(1), "derived-from"));
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn unknown_nodes_yield_empty_results() {
        let store = GraphStore::new();
        assert!(!store.contains(art(9)));
        assert!(store.parents(art(9)).is_empty());
        assert!(store.children(art(9)).is_empty());
        assert!(store.relationships_from(art(9)).is_empty());
    }

    #[test]
    fn cycles_are_accepted() {
        let store = GraphStore::new();
        store.add_relationship(&Relationship::new(art(1), art(2), "derived-from"));
        store.add_relationship(&Relationship::new(art(2), art(3), "derived-from"));
        store.add_relationship(&Relationship::new(art(3), art(1), "derived-from"));
        assert_eq!(store.edge_count(), 3);
    }

    #[test]
    fn bulk_load_counts_edges() {
        let store = GraphStore::new();
        let rels = vec![
            Relationship::new(art(1), art(2), "derived-from"),
            Relationship::new(art(2), art(3), "derived-from"),
        ];
        assert_eq!(store.bulk_load(&rels), 2);
        assert_eq!(store.edge_count(), 2);
        assert_eq!(store.node_count(), 3);
    }

    #[test]
    fn induced_subgraph_drops_outside_edges() {
        let store = GraphStore::new();
        store.add_relationship(&Relationship::new(art(1), art(2), "derived-from"));
        store.add_relationship(&Relationship::new(art(2), art(3), "derived-from"));
        store.add_relationship(&Relationship::new(art(3), art(4), "derived-from"));

        let sub = store.induced([art(1), art(2), art(3)]);
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.edge_count(), 2);
    }

    #[test]
    fn induced_subgraph_keeps_unwired_members_as_isolated_nodes() {
        let store = GraphStore::new();
        store.add_relationship(&Relationship::new(art(1), art(2), "derived-from"));

        let sub = store.induced([art(1), art(2), art(7)]);
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.edge_count(), 1);
    }

    #[test]
    fn relationships_round_trip_attributes() {
        let store = GraphStore::new();
        let meta = crate::metadata::meta_map([("run", 7i64)]);
        store.add_relationship(
            &Relationship::new(art(1), art(2), "derived-from").with_metadata(meta.clone()),
        );
        let all = store.relationships();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].metadata, meta);
    }
}
