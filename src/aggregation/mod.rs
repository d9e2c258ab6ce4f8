//! Rollup Aggregation Engine
//!
//! Turns raw, unordered points into time-bucketed samples:
//!
//! - **types**: Points, series identity and group keys
//! - **kind**: Accumulation rules (sum, count, min, max) behind the `Bucket` trait
//! - **engine**: Bucket placement and point-to-bucket assignment
//! - **session**: Concurrent per-query accumulation state
//! - **result**: Finalized, ordered output
//!
//! # Example
//!
//! ```rust
//! use rollup::aggregation::{AggregationKind, BucketAggregation, GroupKey, Point};
//! use rollup::time::TimeRange;
//!
//! let aggregation = BucketAggregation::new(AggregationKind::Sum, 1000, 1000).unwrap();
//! let session = aggregation.session(&TimeRange::with_open_start(1000, 3000).unwrap());
//!
//! session
//!     .update_points(&GroupKey::empty(), &[], &[Point::new(1500, 1.0), Point::new(2500, 2.0)])
//!     .unwrap();
//!
//! let result = session.result().unwrap();
//! assert_eq!(result.groups[0].samples, vec![Point::new(2000, 1.0), Point::new(3000, 2.0)]);
//! ```

mod engine;
mod error;
mod kind;
mod result;
mod session;
mod types;

pub use engine::{BucketAggregation, BucketLayout};
pub use error::AggregationError;
pub use kind::{AggregationKind, Bucket};
pub use result::{AggregationResult, ResultGroup, Statistics};
pub use session::AggregationSession;
pub use types::{GroupKey, Point, Series, Tags};
