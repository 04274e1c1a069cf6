//! Lineage chains: named pipeline groupings over the derivation graph.
//!
//! A chain is a frozen membership snapshot: the set of artifacts that make
//! up one logical pipeline, anchored at declared root nodes. Relationships
//! added to the graph after a chain is created do not grow the chain;
//! membership changes only through [`ChainRegistry::extend`].

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, IdAllocator, now_millis};
use crate::error::{ChainError, SeshatResult};
use crate::metadata::MetaMap;
use crate::store::LineageStore;

/// Unique, niche-optimized identifier for a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ChainId(std::num::NonZeroU64);

impl ChainId {
    /// Create a `ChainId` from a raw `u64`. Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        std::num::NonZeroU64::new(raw).map(ChainId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain:{}", self.0)
    }
}

/// Structural classification of a chain.
///
/// Stored on the chain as a declared default; the analyzer computes a
/// suggested class from the actual subgraph shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainClass {
    /// Every node has at most one parent and one child within the chain.
    Linear,
    /// At least one node fans out to multiple children.
    Branching,
    /// At least one node joins multiple parents.
    Merging,
    /// Cyclic, or both branching and merging.
    Complex,
}

impl std::fmt::Display for ChainClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainClass::Linear => write!(f, "linear"),
            ChainClass::Branching => write!(f, "branching"),
            ChainClass::Merging => write!(f, "merging"),
            ChainClass::Complex => write!(f, "complex"),
        }
    }
}

/// A named lineage chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    /// Unique identifier.
    pub id: ChainId,
    /// Human-readable pipeline name.
    pub name: String,
    /// Declared classification (defaults to [`ChainClass::Linear`]).
    pub class: ChainClass,
    /// Declared entry points of the pipeline, in declaration order.
    pub root_nodes: Vec<ArtifactId>,
    /// Declared terminal outputs. Advisory: may lag behind the graph.
    pub leaf_nodes: Vec<ArtifactId>,
    /// Full membership snapshot, roots included.
    pub all_nodes: BTreeSet<ArtifactId>,
    /// When the chain was created (milliseconds since UNIX epoch).
    pub created_at: u64,
    /// When membership or classification last changed.
    pub last_modified: u64,
    /// Free-form annotations.
    pub metadata: MetaMap,
}

impl Chain {
    /// Whether an artifact belongs to this chain.
    pub fn contains(&self, id: ArtifactId) -> bool {
        self.all_nodes.contains(&id)
    }

    /// Number of member artifacts.
    pub fn len(&self) -> usize {
        self.all_nodes.len()
    }

    /// Whether the chain has no members.
    pub fn is_empty(&self) -> bool {
        self.all_nodes.is_empty()
    }
}

/// Registry of lineage chains.
///
/// Every mutation persists through the [`LineageStore`] before it becomes
/// visible in memory, so a failed write leaves the registry unchanged.
pub struct ChainRegistry {
    chains: DashMap<ChainId, Chain>,
    allocator: IdAllocator,
    store: Arc<dyn LineageStore>,
}

impl ChainRegistry {
    /// Create a registry backed by the given store.
    pub fn new(store: Arc<dyn LineageStore>) -> Self {
        Self {
            chains: DashMap::new(),
            allocator: IdAllocator::new(),
            store,
        }
    }

    /// Create a new chain anchored at the given roots.
    ///
    /// Requires at least one root node. Membership starts as exactly the
    /// root set; the class defaults to [`ChainClass::Linear`] until
    /// reclassified.
    pub fn create(
        &self,
        name: &str,
        roots: &[ArtifactId],
        metadata: MetaMap,
    ) -> SeshatResult<Chain> {
        if roots.is_empty() {
            return Err(ChainError::EmptyRootNodes.into());
        }
        let id = ChainId(self.allocator.next_raw()?);
        let now = now_millis();
        let chain = Chain {
            id,
            name: name.to_owned(),
            class: ChainClass::Linear,
            root_nodes: roots.to_vec(),
            leaf_nodes: Vec::new(),
            all_nodes: roots.iter().copied().collect(),
            created_at: now,
            last_modified: now,
            metadata,
        };
        self.store.upsert_chain(&chain)?;
        self.chains.insert(id, chain.clone());
        tracing::debug!(chain = %id, name, roots = roots.len(), "created chain");
        Ok(chain)
    }

    /// Fetch a chain, erroring when unknown.
    pub fn get(&self, id: ChainId) -> SeshatResult<Chain> {
        self.lookup(id)
            .ok_or_else(|| ChainError::NotFound { chain_id: id.get() }.into())
    }

    /// Fetch a chain, `None` when unknown.
    pub fn lookup(&self, id: ChainId) -> Option<Chain> {
        self.chains.get(&id).map(|r| r.value().clone())
    }

    /// Whether a chain id is registered.
    pub fn contains(&self, id: ChainId) -> bool {
        self.chains.contains_key(&id)
    }

    /// Add artifacts to a chain's membership snapshot.
    pub fn extend(&self, id: ChainId, nodes: &[ArtifactId]) -> SeshatResult<Chain> {
        self.update(id, |chain| {
            chain.all_nodes.extend(nodes.iter().copied());
        })
    }

    /// Replace a chain's declared leaf nodes.
    ///
    /// Leaves are advisory and are not validated against membership; the
    /// analyzer computes actual leaves from the subgraph when asked.
    pub fn set_leaf_nodes(&self, id: ChainId, leaves: &[ArtifactId]) -> SeshatResult<Chain> {
        self.update(id, |chain| {
            chain.leaf_nodes = leaves.to_vec();
        })
    }

    /// Replace a chain's declared classification.
    pub fn set_class(&self, id: ChainId, class: ChainClass) -> SeshatResult<Chain> {
        self.update(id, |chain| {
            chain.class = class;
        })
    }

    fn update(&self, id: ChainId, apply: impl FnOnce(&mut Chain)) -> SeshatResult<Chain> {
        let mut chain = self.get(id)?;
        apply(&mut chain);
        chain.last_modified = now_millis();
        self.store.upsert_chain(&chain)?;
        self.chains.insert(id, chain.clone());
        Ok(chain)
    }

    /// All chains, sorted by id.
    pub fn list(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.chains.iter().map(|r| r.value().clone()).collect();
        chains.sort_by_key(|c| c.id);
        chains
    }

    /// Number of registered chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Insert an already-persisted chain. Used during hydration.
    pub fn register(&self, chain: Chain) {
        self.allocator.advance_past(chain.id.get());
        self.chains.insert(chain.id, chain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemoryStore;

    fn art(id: u64) -> ArtifactId {
        ArtifactId::new(id).unwrap()
    }

    fn registry() -> ChainRegistry {
        ChainRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn create_seeds_membership_from_roots() {
        let reg = registry();
        let chain = reg
            .create("nightly-etl", &[art(1), art(2)], MetaMap::new())
            .unwrap();
        assert_eq!(chain.class, ChainClass::Linear);
        assert_eq!(chain.root_nodes, vec![art(1), art(2)]);
        assert!(chain.contains(art(1)));
        assert!(chain.contains(art(2)));
        assert_eq!(chain.len(), 2);
        assert!(chain.leaf_nodes.is_empty());
    }

    #[test]
    fn create_rejects_empty_roots() {
        let reg = registry();
        let err = reg.create("empty", &[], MetaMap::new()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::SeshatError::Chain(ChainError::EmptyRootNodes)
        ));
    }

    #[test]
    fn get_unknown_chain_errors() {
        let reg = registry();
        let missing = ChainId::new(404).unwrap();
        assert!(matches!(
            reg.get(missing),
            Err(crate::error::SeshatError::Chain(ChainError::NotFound { chain_id: 404 }))
        ));
        assert!(reg.lookup(missing).is_none());
    }

    #[test]
    fn extend_grows_membership_and_touches_mtime() {
        let reg = registry();
        let chain = reg.create("etl", &[art(1)], MetaMap::new()).unwrap();
        let grown = reg.extend(chain.id, &[art(2), art(3)]).unwrap();
        assert_eq!(grown.len(), 3);
        assert!(grown.last_modified >= chain.last_modified);
        // Membership is a set: re-adding is a no-op.
        let again = reg.extend(chain.id, &[art(2)]).unwrap();
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn leaf_nodes_are_replaced_wholesale() {
        let reg = registry();
        let chain = reg.create("etl", &[art(1)], MetaMap::new()).unwrap();
        reg.set_leaf_nodes(chain.id, &[art(5), art(6)]).unwrap();
        let updated = reg.get(chain.id).unwrap();
        assert_eq!(updated.leaf_nodes, vec![art(5), art(6)]);
        reg.set_leaf_nodes(chain.id, &[art(7)]).unwrap();
        assert_eq!(reg.get(chain.id).unwrap().leaf_nodes, vec![art(7)]);
    }

    #[test]
    fn ids_are_sequential_and_resume_after_hydration() {
        let reg = registry();
        let a = reg.create("one", &[art(1)], MetaMap::new()).unwrap();
        let b = reg.create("two", &[art(1)], MetaMap::new()).unwrap();
        assert_eq!(a.id.get() + 1, b.id.get());

        let reg2 = registry();
        let mut restored = a.clone();
        restored.id = ChainId::new(10).unwrap();
        reg2.register(restored);
        let fresh = reg2.create("three", &[art(1)], MetaMap::new()).unwrap();
        assert!(fresh.id.get() > 10);
    }

    #[test]
    fn list_is_sorted_by_id() {
        let reg = registry();
        for name in ["a", "b", "c"] {
            reg.create(name, &[art(1)], MetaMap::new()).unwrap();
        }
        let ids: Vec<u64> = reg.list().iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn mutations_are_persisted_through_the_store() {
        let store = Arc::new(MemoryStore::new());
        let reg = ChainRegistry::new(Arc::clone(&store) as Arc<dyn LineageStore>);
        let chain = reg.create("etl", &[art(1)], MetaMap::new()).unwrap();
        reg.extend(chain.id, &[art(2)]).unwrap();

        let persisted = store.get_chain(chain.id).unwrap().unwrap();
        assert!(persisted.contains(art(2)));
    }
}
