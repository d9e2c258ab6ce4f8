//! Cluster query error types
//!
//! `ShardError` is local to one shard and recovered by the reducer;
//! `ClusterError` fails the whole query.

use crate::aggregation::AggregationError;
use crate::time::RangeError;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a points source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Backend could not be reached
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with an error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Failure of a single shard sub-query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Fetch did not complete within the shard timeout
    #[error("Shard timed out after {0:?}")]
    Timeout(Duration),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Shard task panicked or was aborted
    #[error("Shard task failed: {0}")]
    Task(String),
}

/// A shard that was excluded from a merged result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
    pub shard: String,
    pub error: ShardError,
}

/// Errors that fail a whole cluster query
#[derive(Error, Debug)]
pub enum ClusterError {
    /// No shard set has been published to the registry yet
    #[error("Cluster not ready: no shards registered")]
    NotReady,

    /// Registry holds an empty shard set
    #[error("No shards available for query")]
    NoShards,

    /// Every shard failed; nothing to merge
    #[error("All {} shards failed", failures.len())]
    AllShardsFailed { failures: Vec<ShardFailure> },

    /// Query was cancelled before all shards completed
    #[error("Query cancelled")]
    Cancelled,

    #[error("Invalid query range: {0}")]
    Range(#[from] RangeError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;
