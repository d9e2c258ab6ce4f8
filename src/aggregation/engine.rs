//! Bucket engine
//!
//! Places buckets over a query range and decides which buckets a point feeds.
//!
//! # Placement
//!
//! For a range with start `s`, end `e` and sampling size `size` there are
//! `ceil((e - s) / size)` buckets.
//!
//! ```text
//! open start (s, e]:   timestamps s+size, s+2*size, ..., e
//!                      bucket k claims (s+(k+1)*size - extent, min(s+(k+1)*size, e)]
//!
//! closed start [s, e]: timestamps s, s+size, ... (< e)
//!                      bucket k claims [s+k*size, s+k*size + extent) ∩ (.., e]
//! ```
//!
//! With `extent == size` windows tile the range, a shorter extent leaves gaps
//! whose points are dropped, and a longer one lets a point feed several
//! consecutive buckets. The buckets a point feeds are always a contiguous
//! index range, computed in constant time.

use crate::aggregation::error::AggregationError;
use crate::aggregation::kind::AggregationKind;
use crate::aggregation::session::AggregationSession;
use crate::time::TimeRange;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Aggregation definition: rule plus bucket spacing and look-back extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketAggregation {
    kind: AggregationKind,
    size: i64,
    extent: i64,
}

impl BucketAggregation {
    /// Create a bucket aggregation
    ///
    /// Fails with `InvalidSampling` unless both `size` and `extent` are
    /// strictly positive.
    pub fn new(kind: AggregationKind, size: i64, extent: i64) -> Result<Self, AggregationError> {
        if size <= 0 || extent <= 0 {
            return Err(AggregationError::InvalidSampling { size, extent });
        }

        Ok(Self { kind, size, extent })
    }

    /// Aggregation whose extent equals its sampling size
    pub fn sampling(kind: AggregationKind, size: i64) -> Result<Self, AggregationError> {
        Self::new(kind, size, size)
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn extent(&self) -> i64 {
        self.extent
    }

    /// Bucket placement for a query range
    pub fn layout(&self, range: &TimeRange) -> BucketLayout {
        let span = range.end - range.start;
        let count = if span > 0 { ceil_div(span, self.size) } else { 0 };

        BucketLayout {
            start: range.start,
            end: range.end,
            open_start: range.open_start,
            size: self.size,
            extent: self.extent,
            count: count as usize,
        }
    }

    /// Start a new aggregation session over `range`
    pub fn session(&self, range: &TimeRange) -> AggregationSession {
        AggregationSession::new(self.kind, self.layout(range))
    }
}

/// Bucket boundaries of one aggregation over one query range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLayout {
    start: i64,
    end: i64,
    open_start: bool,
    size: i64,
    extent: i64,
    count: usize,
}

impl BucketLayout {
    /// Number of buckets
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Timestamp of the bucket at `index`
    pub fn timestamp(&self, index: usize) -> i64 {
        let k = index as i64;

        if self.open_start {
            (self.start + (k + 1) * self.size).min(self.end)
        } else {
            self.start + k * self.size
        }
    }

    /// All bucket timestamps, ascending
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.count).map(move |index| self.timestamp(index))
    }

    /// Indexes of the buckets whose window claims `timestamp`
    ///
    /// Empty when the point falls in a gap or outside the range.
    pub fn matching(&self, timestamp: i64) -> Range<usize> {
        if timestamp > self.end {
            return 0..0;
        }

        let count = self.count as i64;

        let rel = match timestamp.checked_sub(self.start) {
            Some(rel) => rel,
            None => return 0..0,
        };

        let (lo, hi) = if self.open_start {
            // No window reaches further back than s - extent
            if rel < -self.extent {
                return 0..0;
            }
            // t <= s + (k+1)*size  and  s + (k+1)*size < t + extent
            let lo = ceil_div(rel, self.size) - 1;
            let hi = match rel.checked_add(self.extent) {
                Some(reach) => ceil_div(reach, self.size) - 1,
                None => count,
            };
            (lo, hi)
        } else {
            if rel < 0 {
                return 0..0;
            }
            // s + k*size <= t  and  t < s + k*size + extent
            let lo = (rel - self.extent).div_euclid(self.size) + 1;
            let hi = rel.div_euclid(self.size) + 1;
            (lo, hi)
        };

        let lo = lo.clamp(0, count) as usize;
        let hi = hi.clamp(0, count) as usize;

        if lo >= hi {
            0..0
        } else {
            lo..hi
        }
    }
}

/// Ceiling division for a strictly positive divisor
fn ceil_div(a: i64, b: i64) -> i64 {
    -((-a).div_euclid(b))
}
