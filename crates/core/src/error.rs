//! Error types for hydronet
//!
//! Construction-time errors are never recovered locally: a
//! partially-directed or partially-ranked network has no well-defined
//! semantics, so every variant here aborts the whole batch. Query
//! misses are expressed as `Option` / empty collections, never as an
//! error.

use thiserror::Error;

/// Main error type for hydronet operations
#[derive(Error, Debug)]
pub enum Error {
    /// Degenerate edges, detached bank edges, edges left unresolved
    /// after the sink-seeded traversal, or edges that cannot reach a
    /// sink.
    #[error("malformed network: {0}")]
    MalformedNetwork(String),

    /// The post-direction check found a directed cycle. The whole
    /// batch result is discarded.
    #[error("cycle detected in directed network at ({x}, {y})")]
    CycleDetected { x: f64, y: f64 },

    /// Conflicting in/out flow-point requirements at one coordinate,
    /// or no waterbody found for an angle-ambiguous node.
    #[error("ambiguous construction: {0}")]
    AmbiguousConstruction(String),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias for hydronet operations
pub type Result<T> = std::result::Result<T, Error>;
