//! Chain structure analysis: shape metrics over chain-scoped subgraphs.
//!
//! The analyzer snapshots the subgraph induced by a chain's membership and
//! computes structural metrics on the detached copy, so analysis never
//! blocks writers. Chain membership is the unit of analysis; edges leaving
//! the chain are invisible to it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::{connected_components, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::artifact::ArtifactId;
use crate::chain::{ChainClass, ChainId, ChainRegistry};

use super::RelationshipAttrs;
use super::store::GraphStore;

/// Structural metrics for one chain's subgraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStructure {
    /// Member artifacts, wired or not.
    pub total_nodes: usize,
    /// Derivation edges between members.
    pub total_edges: usize,
    /// Distinct declared roots.
    pub root_count: usize,
    /// Members with no outgoing edge inside the chain.
    pub leaf_count: usize,
    /// Longest root-to-leaf distance in hops (see [`ChainAnalyzer::analyze`]).
    pub max_depth: usize,
    /// Mean out-degree: edges / nodes.
    pub branching_factor: f64,
    /// Whether the subgraph is acyclic.
    pub is_dag: bool,
    /// Weakly connected components.
    pub connected_components: usize,
    /// Edge density: edges / (nodes * (nodes - 1)).
    pub density: f64,
    /// Classification suggested by the subgraph shape.
    pub suggested_class: ChainClass,
}

impl Default for ChainStructure {
    fn default() -> Self {
        Self {
            total_nodes: 0,
            total_edges: 0,
            root_count: 0,
            leaf_count: 0,
            max_depth: 0,
            branching_factor: 0.0,
            is_dag: true,
            connected_components: 0,
            density: 0.0,
            suggested_class: ChainClass::Linear,
        }
    }
}

/// Analyzer over the shared graph and chain registry.
pub struct ChainAnalyzer {
    graph: Arc<GraphStore>,
    chains: Arc<ChainRegistry>,
}

impl ChainAnalyzer {
    /// Create an analyzer over the given graph and registry.
    pub fn new(graph: Arc<GraphStore>, chains: Arc<ChainRegistry>) -> Self {
        Self { graph, chains }
    }

    /// Compute structural metrics for a chain.
    ///
    /// Unknown chains yield the empty (all-zero, acyclic) structure rather
    /// than an error. `max_depth` is the longest hop distance from any
    /// declared root to any computed leaf; when no (root, leaf) pair is
    /// connected (a leafless cycle, say), it is 0.
    pub fn analyze(&self, id: ChainId) -> ChainStructure {
        let Some(chain) = self.chains.lookup(id) else {
            return ChainStructure::default();
        };

        let sub = self.graph.induced(chain.all_nodes.iter().copied());
        let n = sub.node_count();
        let e = sub.edge_count();
        if n == 0 {
            return ChainStructure::default();
        }

        let is_dag = !is_cyclic_directed(&sub);
        let index_of: HashMap<ArtifactId, NodeIndex> = sub
            .node_indices()
            .filter_map(|idx| sub.node_weight(idx).map(|&id| (id, idx)))
            .collect();

        let leaves: Vec<NodeIndex> = sub
            .node_indices()
            .filter(|&idx| sub.neighbors_directed(idx, Direction::Outgoing).count() == 0)
            .collect();

        let roots: Vec<NodeIndex> = {
            let mut seen = std::collections::HashSet::new();
            chain
                .root_nodes
                .iter()
                .filter(|&&root| seen.insert(root))
                .filter_map(|root| index_of.get(root).copied())
                .collect()
        };

        let max_depth = roots
            .iter()
            .map(|&root| depth_to_leaves(&sub, root, &leaves))
            .max()
            .unwrap_or(0);

        let branching = sub
            .node_indices()
            .any(|idx| sub.neighbors_directed(idx, Direction::Outgoing).count() > 1);
        let merging = sub
            .node_indices()
            .any(|idx| sub.neighbors_directed(idx, Direction::Incoming).count() > 1);

        let suggested_class = if !is_dag || (branching && merging) {
            ChainClass::Complex
        } else if merging {
            ChainClass::Merging
        } else if branching {
            ChainClass::Branching
        } else {
            ChainClass::Linear
        };

        ChainStructure {
            total_nodes: n,
            total_edges: e,
            root_count: roots.len(),
            leaf_count: leaves.len(),
            max_depth,
            branching_factor: e as f64 / n as f64,
            is_dag,
            connected_components: connected_components(&sub),
            density: if n >= 2 {
                e as f64 / (n * (n - 1)) as f64
            } else {
                0.0
            },
            suggested_class,
        }
    }
}

/// Longest BFS distance from `root` to any reachable leaf; 0 when no
/// leaf is reachable.
fn depth_to_leaves(
    sub: &DiGraph<ArtifactId, RelationshipAttrs>,
    root: NodeIndex,
    leaves: &[NodeIndex],
) -> usize {
    let mut dist: HashMap<NodeIndex, usize> = HashMap::from([(root, 0)]);
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        let depth = dist[&node];
        for next in sub.neighbors_directed(node, Direction::Outgoing) {
            if let std::collections::hash_map::Entry::Vacant(slot) = dist.entry(next) {
                slot.insert(depth + 1);
                queue.push_back(next);
            }
        }
    }

    leaves
        .iter()
        .filter_map(|leaf| dist.get(leaf).copied())
        .max()
        .unwrap_or(0)
}
