//! Lineage graph: in-memory derivation graph with query and analysis layers.
//!
//! The graph stores directed derivation edges (parent artifact → child
//! artifact) with typed attributes.
//!
//! - **Storage layer** ([`store::GraphStore`]): petgraph-backed adjacency
//!   with an id index, upsert semantics on edges
//! - **Query layer** ([`query::LineageQueryEngine`]): ancestor/descendant
//!   closures, common ancestors, shortest paths
//! - **Analysis layer** ([`analyze::ChainAnalyzer`]): structural metrics
//!   over chain-scoped subgraphs
//!
//! All layers share the same [`Relationship`] data model.

pub mod analyze;
pub mod query;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, now_millis};
use crate::metadata::MetaMap;

/// A directed derivation edge (parent → child) in the lineage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// The upstream artifact the child was derived from.
    pub parent: ArtifactId,
    /// The downstream artifact.
    pub child: ArtifactId,
    /// Relationship kind (e.g. "derived-from", "aggregated-from").
    pub kind: String,
    /// Edge weight; defaults to 1.0 and is carried through to analysis.
    pub weight: f64,
    /// Timestamp (milliseconds since UNIX epoch).
    pub timestamp: u64,
    /// Free-form annotations.
    pub metadata: MetaMap,
}

impl Relationship {
    /// Create a new relationship with unit weight and current timestamp.
    pub fn new(parent: ArtifactId, child: ArtifactId, kind: impl Into<String>) -> Self {
        Self {
            parent,
            child,
            kind: kind.into(),
            weight: 1.0,
            timestamp: now_millis(),
            metadata: MetaMap::new(),
        }
    }

    /// Set the edge weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Attach metadata annotations.
    pub fn with_metadata(mut self, metadata: MetaMap) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Edge attributes stored on petgraph edges.
///
/// The parent/child endpoints live on the graph structure itself; this
/// carries everything else, and an upsert of the same (parent, child) pair
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipAttrs {
    /// Relationship kind.
    pub kind: String,
    /// Edge weight.
    pub weight: f64,
    /// Timestamp.
    pub timestamp: u64,
    /// Free-form annotations.
    pub metadata: MetaMap,
}

impl From<&Relationship> for RelationshipAttrs {
    fn from(rel: &Relationship) -> Self {
        Self {
            kind: rel.kind.clone(),
            weight: rel.weight,
            timestamp: rel.timestamp,
            metadata: rel.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art(id: u64) -> ArtifactId {
        ArtifactId::new(id).unwrap()
    }

    #[test]
    fn relationship_defaults() {
        let rel = Relationship::new(art(1), art(2), "derived-from");
        assert_eq!(rel.weight, 1.0);
        assert!(rel.metadata.is_empty());
        assert!(rel.timestamp > 0);
    }

    #[test]
    fn builders_override_defaults() {
        let meta = crate::metadata::meta_map([("job", "nightly")]);
        let rel = Relationship::new(art(1), art(2), "aggregated-from")
            .with_weight(0.5)
            .with_metadata(meta);
        assert_eq!(rel.weight, 0.5);
        assert_eq!(rel.metadata["job"].as_text(), Some("nightly"));
    }

    #[test]
    fn attrs_capture_everything_but_endpoints() {
        let rel = Relationship::new(art(1), art(2), "derived-from").with_weight(2.0);
        let attrs = RelationshipAttrs::from(&rel);
        assert_eq!(attrs.kind, "derived-from");
        assert_eq!(attrs.weight, 2.0);
        assert_eq!(attrs.timestamp, rel.timestamp);
    }
}
