//! Rich diagnostic error types for the seshat engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the seshat engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SeshatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Artifact errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ArtifactError {
    #[error("invalid artifact name: {name:?}")]
    #[diagnostic(
        code(seshat::artifact::invalid_name),
        help(
            "Artifact names must contain at least one non-whitespace character. \
             Use a stable, meaningful identifier such as a dataset path or table name."
        )
    )]
    InvalidName { name: String },

    #[error("id allocator exhausted: cannot allocate more than u64::MAX ids")]
    #[diagnostic(
        code(seshat::artifact::exhausted),
        help(
            "The id space is exhausted. This is extremely unlikely in practice \
             (requires 2^64 allocations). If you see this error, something is \
             very wrong — check for allocation loops."
        )
    )]
    AllocatorExhausted,
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("common-ancestor query requires at least one node")]
    #[diagnostic(
        code(seshat::query::empty_node_list),
        help("Provide one or more node names to intersect ancestor sets over.")
    )]
    EmptyNodeList,
}

// ---------------------------------------------------------------------------
// Chain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ChainError {
    #[error("chain not found: {chain_id}")]
    #[diagnostic(
        code(seshat::chain::not_found),
        help(
            "No chain with this id is registered. \
             List known chains with `seshat chain list`."
        )
    )]
    NotFound { chain_id: u64 },

    #[error("chain requires at least one root node")]
    #[diagnostic(
        code(seshat::chain::empty_roots),
        help(
            "A lineage chain is anchored at its root artifacts. \
             Pass at least one root node name when creating a chain."
        )
    )]
    EmptyRootNodes,
}

// ---------------------------------------------------------------------------
// Transformation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TransformError {
    #[error("transformation not found: {transform_id}")]
    #[diagnostic(
        code(seshat::transform::not_found),
        help(
            "No transformation with this id is registered. \
             List known transformations with `seshat transform list`."
        )
    )]
    NotFound { transform_id: u64 },

    #[error("transformation requires at least one input artifact")]
    #[diagnostic(
        code(seshat::transform::empty_inputs),
        help("Declare the artifacts this transformation reads from, even if derived trivially.")
    )]
    EmptyInputs,

    #[error("transformation {transform_id} is already in terminal state {status}")]
    #[diagnostic(
        code(seshat::transform::already_terminal),
        help(
            "Completed, failed, and rolled-back transformations cannot be \
             re-executed. Declare a new transformation for a re-run."
        )
    )]
    AlreadyTerminal { transform_id: u64, status: String },

    #[error("invalid status transition for transformation {transform_id}: {from} -> {to}")]
    #[diagnostic(
        code(seshat::transform::invalid_transition),
        help(
            "Transformations move pending -> in-progress -> completed/failed, \
             with rollback allowed from any state that is not already rolled back."
        )
    )]
    InvalidTransition {
        transform_id: u64,
        from: String,
        to: String,
    },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(seshat::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("storage backend error: {message}")]
    #[diagnostic(
        code(seshat::store::backend),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory. \
             If the problem persists, file a bug report."
        )
    )]
    Backend { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(seshat::store::serde),
        help(
            "Failed to serialize or deserialize data. \
             This usually means the stored data format has changed between versions. \
             Try re-recording your lineage."
        )
    )]
    Serialization { message: String },

    #[error("key not found: {key}")]
    #[diagnostic(
        code(seshat::store::not_found),
        help("The requested key does not exist in the store. Verify the key is correct.")
    )]
    NotFound { key: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(seshat::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(seshat::engine::data_dir),
        help(
            "The data directory could not be accessed. \
             Ensure the path exists and has read/write permissions."
        )
    )]
    DataDir { path: String },
}

/// Convenience alias for functions returning seshat results.
pub type SeshatResult<T> = std::result::Result<T, SeshatError>;
