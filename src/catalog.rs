//! Artifact catalog: bidirectional name ↔ id mapping.
//!
//! The [`ArtifactCatalog`] provides O(1) lookups in both directions using
//! two `DashMap`s. Names are opaque keys and are matched exactly; the
//! catalog never normalizes them, so `Orders` and `orders` are distinct
//! artifacts.
//!
//! Registration is split in two so the engine can persist before it
//! publishes: [`ArtifactCatalog::mint`] validates the name and allocates an
//! id without touching the maps, and [`ArtifactCatalog::register`] inserts
//! the already-persisted record.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::artifact::{ArtifactId, ArtifactRecord, IdAllocator};
use crate::error::{ArtifactError, SeshatResult};

/// Bidirectional artifact catalog mapping ids to records and names to ids.
pub struct ArtifactCatalog {
    /// Forward map: ArtifactId → ArtifactRecord (source of truth).
    id_to_record: DashMap<ArtifactId, ArtifactRecord>,
    /// Reverse map: exact name → ArtifactId.
    name_to_id: DashMap<String, ArtifactId>,
    /// Id allocator for newly minted artifacts.
    allocator: IdAllocator,
}

impl ArtifactCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            id_to_record: DashMap::new(),
            name_to_id: DashMap::new(),
            allocator: IdAllocator::new(),
        }
    }

    /// Validate a name and allocate a fresh record for it.
    ///
    /// The record is not yet visible to lookups; callers persist it first and
    /// then publish it with [`ArtifactCatalog::register`]. Names must contain
    /// at least one non-whitespace character.
    pub fn mint(&self, name: &str) -> SeshatResult<ArtifactRecord> {
        if name.trim().is_empty() {
            return Err(ArtifactError::InvalidName { name: name.into() }.into());
        }
        let id = ArtifactId::new(self.allocator.next_raw()?.get())
            .ok_or(ArtifactError::AllocatorExhausted)?;
        Ok(ArtifactRecord::new(id, name))
    }

    /// Publish a record into both maps, returning its id.
    ///
    /// Idempotent on names: if the name is already mapped the existing id is
    /// returned and the incoming record is discarded. Hydration reuses this
    /// path, so the allocator is advanced past every id it sees.
    pub fn register(&self, record: ArtifactRecord) -> ArtifactId {
        self.allocator.advance_past(record.id.get());
        match self.name_to_id.entry(record.name.clone()) {
            Entry::Occupied(existing) => *existing.get(),
            Entry::Vacant(slot) => {
                let id = record.id;
                slot.insert(id);
                self.id_to_record.insert(id, record);
                id
            }
        }
    }

    /// Look up an artifact id by exact name.
    pub fn resolve(&self, name: &str) -> Option<ArtifactId> {
        self.name_to_id.get(name).map(|r| *r.value())
    }

    /// Look up an artifact record by id.
    pub fn get(&self, id: ArtifactId) -> Option<ArtifactRecord> {
        self.id_to_record.get(&id).map(|r| r.value().clone())
    }

    /// Whether a name is already registered.
    pub fn contains_name(&self, name: &str) -> bool {
        self.name_to_id.contains_key(name)
    }

    /// Resolve an id to a human-readable name, falling back to `art:{id}`.
    pub fn resolve_name(&self, id: ArtifactId) -> String {
        self.get(id)
            .map(|r| r.name)
            .unwrap_or_else(|| format!("art:{}", id.get()))
    }

    /// Return all registered artifacts.
    pub fn all(&self) -> Vec<ArtifactRecord> {
        self.id_to_record.iter().map(|r| r.value().clone()).collect()
    }

    /// Number of registered artifacts.
    pub fn len(&self) -> usize {
        self.id_to_record.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.id_to_record.is_empty()
    }
}

impl Default for ArtifactCatalog {
    fn default() -> Self {
        Self::new()
    }
}
