//! Rollup Interval Algebra
//!
//! Millisecond time ranges used to express and split query windows:
//!
//! - **DateRange**: closed-closed range, always non-negative
//! - **TimeRange**: query range with an explicit open-or-closed start
//!
//! # Example
//!
//! ```rust
//! use rollup::time::TimeRange;
//!
//! let range = TimeRange::with_open_start(0, 2500).unwrap();
//! let pieces = range.split_at_period_boundary(1000).unwrap();
//!
//! assert_eq!(pieces.len(), 3);
//! assert_eq!(pieces[1].start, 1000);
//! assert_eq!(pieces[2].end, 2500);
//! ```

mod error;
mod range;

pub use error::{RangeError, RangeResult};
pub use range::{DateRange, TimeRange};
