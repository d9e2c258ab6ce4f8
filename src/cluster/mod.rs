//! Rollup Cluster Layer
//!
//! Distributes one aggregation query over the shards of a cluster:
//!
//! - **source**: The `PointSource` trait shards implement, plus an in-memory shard
//! - **registry**: The explicit, atomically swapped set of shards
//! - **query**: Fan-out, per-shard aggregation, cancellation
//! - **reducer**: Merges shard results, tolerating partial failure
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust
//! use rollup::aggregation::{AggregationKind, BucketAggregation, Point, Series};
//! use rollup::cluster::{ClusterQuery, MemorySource, QueryConfig, QueryRunner, ShardRegistry};
//! use rollup::time::TimeRange;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shard = MemorySource::new("shard-0")
//!         .with_points(Series::new("cpu"), vec![Point::new(1500, 1.0), Point::new(2500, 2.0)]);
//!
//!     let registry = Arc::new(ShardRegistry::with_sources(vec![Arc::new(shard)]));
//!     let runner = QueryRunner::new(registry, QueryConfig::default());
//!
//!     let aggregation = BucketAggregation::sampling(AggregationKind::Sum, 1000)?;
//!     let query = ClusterQuery::new("cpu", aggregation, TimeRange::with_open_start(1000, 3000)?);
//!
//!     let result = runner.run(&query).await?;
//!     assert_eq!(result.groups[0].samples, vec![Point::new(2000, 1.0), Point::new(3000, 2.0)]);
//!     Ok(())
//! }
//! ```

mod error;
mod query;
mod reducer;
mod registry;
mod source;

pub use error::{ClusterError, ClusterResult, ShardError, ShardFailure, SourceError};
pub use query::{ClusterQuery, QueryConfig, QueryRunner};
pub use reducer::{reduce, ShardOutcome};
pub use registry::{Shard, ShardRegistry, ShardSet};
pub use source::{MemorySource, PointSource, SeriesPoints};
