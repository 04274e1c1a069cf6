//! Core artifact identity types for the seshat engine.
//!
//! Artifacts are the atomic units of the lineage system. Every dataset,
//! table, file, or model that participates in a derivation is identified by
//! an [`ArtifactId`] and described by an [`ArtifactRecord`]. The
//! [`IdAllocator`] provides thread-safe id generation for every id space in
//! the engine (artifacts, chains, transformations, provenance records).

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, SeshatResult};

/// Unique, niche-optimized identifier for an artifact.
///
/// Uses `NonZeroU64` so that `Option<ArtifactId>` is the same size as
/// `ArtifactId` (the niche optimization lets the compiler use 0 as the
/// `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ArtifactId(NonZeroU64);

impl ArtifactId {
    /// Create an `ArtifactId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(ArtifactId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "art:{}", self.0)
    }
}

/// Current wall-clock time as milliseconds since the UNIX epoch.
///
/// All timestamps in the engine share this resolution so that persisted
/// records compare consistently across restarts.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Identity record for a registered artifact.
///
/// The name is the external, human-facing key; the id is the internal,
/// graph-facing key. Both are stable across restarts once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Unique identifier.
    pub id: ArtifactId,
    /// External name (dataset path, table name, model identifier).
    pub name: String,
    /// When this artifact was first registered (milliseconds since UNIX epoch).
    pub created_at: u64,
}

impl ArtifactRecord {
    /// Create a new `ArtifactRecord` with the current timestamp.
    pub fn new(id: ArtifactId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: now_millis(),
        }
    }
}

/// Thread-safe monotonic id allocator.
///
/// Produces monotonically increasing raw ids starting from 1. Each registry
/// owns one allocator per id space. Safe to share across threads via
/// `Arc<IdAllocator>`.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create a new allocator that starts from id 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create an allocator that resumes from a given id.
    ///
    /// Useful when restoring state from persistent storage.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    /// Allocate the next raw id.
    ///
    /// Returns an error if the id space is exhausted (after 2^64 - 1 allocations).
    pub fn next_raw(&self) -> SeshatResult<NonZeroU64> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        NonZeroU64::new(raw).ok_or_else(|| ArtifactError::AllocatorExhausted.into())
    }

    /// Move the allocator past a previously issued id.
    ///
    /// Hydration calls this once per restored record so that newly allocated
    /// ids never collide with persisted ones.
    pub fn advance_past(&self, issued: u64) {
        self.next.fetch_max(issued.saturating_add(1), Ordering::Relaxed);
    }

    /// Return the next id that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_id_niche_optimization() {
        // Option<ArtifactId> should be the same size as ArtifactId thanks to NonZeroU64.
        assert_eq!(
            std::mem::size_of::<Option<ArtifactId>>(),
            std::mem::size_of::<ArtifactId>()
        );
    }

    #[test]
    fn artifact_id_zero_is_none() {
        assert!(ArtifactId::new(0).is_none());
        assert!(ArtifactId::new(1).is_some());
        assert_eq!(ArtifactId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let alloc = IdAllocator::new();
        let a = alloc.next_raw().unwrap();
        let b = alloc.next_raw().unwrap();
        let c = alloc.next_raw().unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(c.get(), 3);
    }

    #[test]
    fn allocator_starting_from() {
        let alloc = IdAllocator::starting_from(100);
        assert_eq!(alloc.next_raw().unwrap().get(), 100);
        assert_eq!(alloc.next_raw().unwrap().get(), 101);
    }

    #[test]
    fn allocator_advance_past_only_moves_forward() {
        let alloc = IdAllocator::new();
        alloc.advance_past(50);
        assert_eq!(alloc.peek_next(), 51);
        alloc.advance_past(10);
        assert_eq!(alloc.peek_next(), 51);
        assert_eq!(alloc.next_raw().unwrap().get(), 51);
    }

    #[test]
    fn artifact_record_creation() {
        let id = ArtifactId::new(1).unwrap();
        let record = ArtifactRecord::new(id, "warehouse.orders");
        assert_eq!(record.id, id);
        assert_eq!(record.name, "warehouse.orders");
        assert!(record.created_at > 0);
    }

    #[test]
    fn artifact_id_display() {
        let id = ArtifactId::new(42).unwrap();
        assert_eq!(id.to_string(), "art:42");
    }

    #[test]
    fn artifact_id_ordering() {
        let a = ArtifactId::new(1).unwrap();
        let b = ArtifactId::new(2).unwrap();
        assert!(a < b);
    }
}
