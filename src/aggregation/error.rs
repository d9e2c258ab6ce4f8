//! Aggregation error types
//!
//! Configuration errors are rejected when an aggregation is built; session
//! misuse is reported when it happens.

use thiserror::Error;

/// Errors that can occur while building or running an aggregation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Sampling size or extent is not strictly positive
    #[error("Invalid sampling: size={size} extent={extent} (both must be greater than zero)")]
    InvalidSampling { size: i64, extent: i64 },

    /// Unknown aggregation kind name
    #[error("Unknown aggregation kind: {0}")]
    UnknownKind(String),

    /// Session was already finalized by `result()`
    #[error("Aggregation session already finalized")]
    SessionFinalized,
}
