//! Export types for serializing lineage state.
//!
//! These types provide name-resolved, renderer-neutral representations of
//! chain subgraphs suitable for JSON export and downstream diagramming
//! (mermaid, dot, web viewers).

use serde::{Deserialize, Serialize};

/// Exported chain node with resolved name and role flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramNode {
    /// Numeric artifact id.
    pub id: u64,
    /// Human-readable artifact name.
    pub name: String,
    /// Whether this node is a declared root of the chain.
    pub root: bool,
    /// Whether this node has no outgoing edge inside the chain.
    pub leaf: bool,
}

/// Exported derivation edge between two chain members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramEdge {
    /// Parent artifact id.
    pub source: u64,
    /// Child artifact id.
    pub target: u64,
    /// Relationship kind.
    pub kind: String,
    /// Edge weight.
    pub weight: f64,
}

/// A renderable snapshot of one chain's subgraph.
///
/// Nodes are sorted by id and edges by (source, target) so repeated
/// exports of an unchanged chain are byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainDiagram {
    /// Numeric chain id.
    pub chain: u64,
    /// Chain name.
    pub name: String,
    /// All member nodes, wired or isolated.
    pub nodes: Vec<DiagramNode>,
    /// All edges between members.
    pub edges: Vec<DiagramEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagram_serializes_to_json() {
        let diagram = ChainDiagram {
            chain: 1,
            name: "nightly-etl".into(),
            nodes: vec![DiagramNode {
                id: 1,
                name: "raw.events".into(),
                root: true,
                leaf: false,
            }],
            edges: vec![DiagramEdge {
                source: 1,
                target: 2,
                kind: "derived-from".into(),
                weight: 1.0,
            }],
        };
        let json = serde_json::to_string(&diagram).unwrap();
        assert!(json.contains("\"nightly-etl\""));
        assert!(json.contains("\"derived-from\""));

        let back: ChainDiagram = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nodes.len(), 1);
        assert_eq!(back.edges.len(), 1);
        assert!(back.nodes[0].root);
    }
}
