//! # Rollup
//!
//! Distributed Time-Series Aggregation Core - interval algebra, bucketed
//! downsampling, shard fan-out with partial-failure tolerance, and cache
//! addressing for aggregated results.
//!
//! ## Modules
//!
//! - [`time`]: Half-open and closed millisecond ranges, period splitting
//! - [`aggregation`]: Bucket placement and concurrent aggregation sessions
//! - [`cluster`]: Shard registry, query fan-out and result reduction
//! - [`cache`]: Cache keys, blocks, write-back and range lookup
//! - [`config`]: TOML and environment configuration
//! - [`import`]: CSV loading into in-memory shards
//!
//! ## Architecture
//!
//! ```text
//! ClusterQuery
//!   → ShardRegistry snapshot
//!   → per shard: fetch → AggregationSession (buckets) → result
//!   → reduce (merge by group key, tolerate failed shards)
//!   → AggregationResult (→ CacheWriter)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollup::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shard = MemorySource::new("shard-0").with_points(
//!         Series::new("cpu").tag("host", "a"),
//!         vec![Point::new(61_000, 0.5), Point::new(95_000, 0.7)],
//!     );
//!
//!     let registry = Arc::new(ShardRegistry::with_sources(vec![Arc::new(shard)]));
//!     let runner = QueryRunner::new(registry, QueryConfig::default());
//!
//!     let aggregation = BucketAggregation::sampling(AggregationKind::Max, 60_000)?;
//!     let range = TimeRange::with_open_start(60_000, 180_000)?;
//!     let query = ClusterQuery::new("cpu", aggregation, range).group_by(["host"]);
//!
//!     for group in runner.run(&query).await?.groups {
//!         println!("{}: {:?}", group.key, group.samples);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod import;
pub mod time;

// Re-export top-level types for convenience
pub use aggregation::{
    AggregationError, AggregationKind, AggregationResult, AggregationSession, BucketAggregation,
    GroupKey, Point, Series,
};

pub use cache::{AggregationCache, CacheError, CacheKey, CacheReader, CacheWriter, MemoryCache};

pub use cluster::{
    ClusterError, ClusterQuery, MemorySource, PointSource, QueryConfig, QueryRunner, ShardRegistry,
};

pub use config::{Config, ConfigError};

pub use time::{DateRange, RangeError, TimeRange};

/// Commonly used types
pub mod prelude {
    pub use crate::aggregation::{
        AggregationKind, AggregationResult, BucketAggregation, GroupKey, Point, Series,
    };
    pub use crate::cluster::{
        ClusterQuery, MemorySource, PointSource, QueryConfig, QueryRunner, ShardRegistry,
    };
    pub use crate::time::TimeRange;
}
