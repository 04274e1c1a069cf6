//! Lineage closure queries: ancestors, descendants, common ancestors, paths.
//!
//! All queries are BFS-based and read-only. Depth limits count hops, so a
//! limit of 1 yields direct parents (or children) only; `None` means the
//! full transitive closure. Unknown nodes yield empty results rather than
//! errors, so queries compose without existence checks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rayon::prelude::*;

use crate::artifact::ArtifactId;
use crate::error::QueryError;

use super::store::GraphStore;

/// Result type for query operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Read-side query engine over a shared [`GraphStore`].
///
/// Cheap to clone (it is an `Arc` handle) and safe to call from multiple
/// threads; per-seed sweeps in [`LineageQueryEngine::common_ancestors`] run
/// in parallel on the rayon pool.
#[derive(Clone)]
pub struct LineageQueryEngine {
    graph: Arc<GraphStore>,
}

impl LineageQueryEngine {
    /// Create a query engine over the given graph.
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    /// Transitive upstream closure of a node.
    ///
    /// Walks parent edges breadth-first up to `max_depth` hops. A node is
    /// never reported as its own ancestor, even when it sits on a cycle.
    pub fn ancestors(&self, node: ArtifactId, max_depth: Option<usize>) -> HashSet<ArtifactId> {
        self.closure(node, max_depth, Walk::Up)
    }

    /// Transitive downstream closure of a node.
    pub fn descendants(&self, node: ArtifactId, max_depth: Option<usize>) -> HashSet<ArtifactId> {
        self.closure(node, max_depth, Walk::Down)
    }

    fn closure(
        &self,
        start: ArtifactId,
        max_depth: Option<usize>,
        walk: Walk,
    ) -> HashSet<ArtifactId> {
        let mut result: HashSet<ArtifactId> = HashSet::new();
        if !self.graph.contains(start) {
            return result;
        }

        let mut visited: HashSet<ArtifactId> = HashSet::from([start]);
        // BFS queue: (node, hops from start)
        let mut queue: VecDeque<(ArtifactId, usize)> = VecDeque::from([(start, 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|limit| depth >= limit) {
                continue;
            }
            let neighbors = match walk {
                Walk::Up => self.graph.parents(node),
                Walk::Down => self.graph.children(node),
            };
            for next in neighbors {
                if visited.insert(next) {
                    result.insert(next);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        result
    }

    /// Intersection of the full ancestor closures of several nodes.
    ///
    /// Ancestor sweeps for the individual seeds run in parallel. An empty
    /// seed list is a caller error; a seed with no ancestors (or an unknown
    /// seed) makes the intersection empty.
    pub fn common_ancestors(&self, nodes: &[ArtifactId]) -> QueryResult<HashSet<ArtifactId>> {
        if nodes.is_empty() {
            return Err(QueryError::EmptyNodeList);
        }

        let mut sets: Vec<HashSet<ArtifactId>> = nodes
            .par_iter()
            .map(|&node| self.ancestors(node, None))
            .collect();

        let mut common = sets.pop().unwrap_or_default();
        for set in sets {
            common.retain(|id| set.contains(id));
            if common.is_empty() {
                break;
            }
        }
        Ok(common)
    }

    /// Shortest derivation path from `source` to `target`, inclusive.
    ///
    /// BFS guarantees the returned path has the minimum hop count. Returns
    /// `None` when either endpoint is unknown or no directed path exists.
    /// A node trivially reaches itself: `path(a, a)` is `Some([a])`.
    pub fn path(&self, source: ArtifactId, target: ArtifactId) -> Option<Vec<ArtifactId>> {
        if !self.graph.contains(source) || !self.graph.contains(target) {
            return None;
        }
        if source == target {
            return Some(vec![source]);
        }

        let mut visited: HashSet<ArtifactId> = HashSet::from([source]);
        let mut came_from: HashMap<ArtifactId, ArtifactId> = HashMap::new();
        let mut queue: VecDeque<ArtifactId> = VecDeque::from([source]);

        while let Some(node) = queue.pop_front() {
            for next in self.graph.children(node) {
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, node);
                if next == target {
                    return Some(Self::reconstruct(&came_from, source, target));
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn reconstruct(
        came_from: &HashMap<ArtifactId, ArtifactId>,
        source: ArtifactId,
        target: ArtifactId,
    ) -> Vec<ArtifactId> {
        let mut path = vec![target];
        let mut cursor = target;
        while cursor != source {
            match came_from.get(&cursor) {
                Some(&prev) => {
                    path.push(prev);
                    cursor = prev;
                }
                // Unreachable: every queued node has a predecessor entry.
                None => break,
            }
        }
        path.reverse();
        path
    }
}

#[derive(Clone, Copy)]
enum Walk {
    Up,
    Down,
}
