//! Rollup Aggregation Cache
//!
//! Addresses aggregated samples so they can be stored and found again:
//!
//! - **key**: Aggregation definition, block key and block layout
//! - **backend**: The `AggregationCache` trait and an in-memory backend
//! - **writer**: Write-back of query results
//! - **reader**: Range lookups that report what is still missing
//! - **error**: Error types
//!
//! # Layout
//!
//! ```text
//! column width = size × block_width
//! base         = t − (t mod column width)
//! slot         = (t mod column width) / size
//! ```

mod backend;
mod error;
mod key;
mod reader;
mod writer;

/// Samples per cached block
pub const DEFAULT_BLOCK_WIDTH: i64 = 1200;

pub use backend::{AggregationCache, MemoryCache};
pub use error::{CacheError, CacheResult};
pub use key::{AggregationDefinition, CacheKey, CachedBlock};
pub use reader::{CacheLookup, CacheReader};
pub use writer::{CachePutResult, CacheWriter};
