//! # seshat
//!
//! A data lineage and transformation provenance engine: tracks derivation
//! relationships between opaque data artifacts, records the transformations
//! that produced them, and answers ancestry, path, and structural questions
//! over named sub-graphs ("chains").
//!
//! ## Architecture
//!
//! - **Artifacts** (`artifact`, `catalog`): names interned to `NonZeroU64`
//!   handles; the graph only ever sees handles
//! - **Derivation graph** (`graph`): petgraph adjacency behind one lock,
//!   BFS query engine, chain structure analyzer
//! - **Chains** (`chain`): named membership snapshots anchored at roots
//! - **Transformations** (`transform`): declared steps with a guarded
//!   lifecycle state machine
//! - **Provenance** (`provenance`): append-only per-artifact audit ledger
//! - **Storage** (`store`): write-through `LineageStore` contract with
//!   memory (DashMap) and durable (redb) backends
//!
//! ## Library usage
//!
//! ```no_run
//! use seshat::engine::{Engine, EngineConfig};
//! use seshat::metadata::MetaMap;
//!
//! let engine = Engine::open(EngineConfig::default()).unwrap();
//! engine
//!     .add_relationship("raw.events", "clean.events", "derived-from", 1.0, MetaMap::new())
//!     .unwrap();
//! assert!(engine.descendants("raw.events", None).contains("clean.events"));
//! ```

pub mod artifact;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod metadata;
pub mod paths;
pub mod provenance;
pub mod store;
pub mod transform;
