//! Aggregation kinds and their per-bucket accumulation rules
//!
//! The engine only knows where buckets sit and which points they claim; what
//! a bucket does with a point is decided here. Every kind is associative and
//! commutative, so bucket state never depends on update order and partial
//! results from different shards can be merged with `reduce`.

use crate::aggregation::error::AggregationError;
use crate::aggregation::types::{Point, Tags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accumulation unit for one output sample at one timestamp
pub trait Bucket: Send + fmt::Debug {
    /// Timestamp of the sample this bucket builds
    fn timestamp(&self) -> i64;

    /// Feed one point that falls inside this bucket's window
    fn update_point(&mut self, tags: &Tags, point: &Point);

    /// Convert the accumulated state into an output sample
    fn build(&self) -> Point;
}

/// How points in a bucket window are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    /// Sum of values
    Sum,
    /// Number of points
    Count,
    /// Smallest value
    Min,
    /// Largest value
    Max,
}

impl AggregationKind {
    pub fn all() -> &'static [AggregationKind] {
        &[
            AggregationKind::Sum,
            AggregationKind::Count,
            AggregationKind::Min,
            AggregationKind::Max,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationKind::Sum => "sum",
            AggregationKind::Count => "count",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
        }
    }

    /// Create an empty bucket for this kind
    pub fn create_bucket(&self, timestamp: i64) -> Box<dyn Bucket> {
        match self {
            AggregationKind::Sum => Box::new(SumBucket::new(timestamp)),
            AggregationKind::Count => Box::new(CountBucket::new(timestamp)),
            AggregationKind::Min => Box::new(MinBucket::new(timestamp)),
            AggregationKind::Max => Box::new(MaxBucket::new(timestamp)),
        }
    }

    /// Value emitted for a bucket that no point reached
    pub fn empty_value(&self) -> f64 {
        match self {
            AggregationKind::Sum | AggregationKind::Count => 0.0,
            AggregationKind::Min | AggregationKind::Max => f64::NAN,
        }
    }

    /// Merge two partial values for the same bucket
    ///
    /// NaN marks an empty min/max bucket and never wins.
    pub fn reduce(&self, a: f64, b: f64) -> f64 {
        match self {
            AggregationKind::Sum | AggregationKind::Count => a + b,
            AggregationKind::Min => a.min(b),
            AggregationKind::Max => a.max(b),
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationKind {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AggregationKind::Sum),
            "count" => Ok(AggregationKind::Count),
            "min" => Ok(AggregationKind::Min),
            "max" => Ok(AggregationKind::Max),
            other => Err(AggregationError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug)]
struct SumBucket {
    timestamp: i64,
    sum: f64,
}

impl SumBucket {
    fn new(timestamp: i64) -> Self {
        Self { timestamp, sum: 0.0 }
    }
}

impl Bucket for SumBucket {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn update_point(&mut self, _tags: &Tags, point: &Point) {
        self.sum += point.value;
    }

    fn build(&self) -> Point {
        Point::new(self.timestamp, self.sum)
    }
}

#[derive(Debug)]
struct CountBucket {
    timestamp: i64,
    count: u64,
}

impl CountBucket {
    fn new(timestamp: i64) -> Self {
        Self { timestamp, count: 0 }
    }
}

impl Bucket for CountBucket {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn update_point(&mut self, _tags: &Tags, _point: &Point) {
        self.count += 1;
    }

    fn build(&self) -> Point {
        Point::new(self.timestamp, self.count as f64)
    }
}

#[derive(Debug)]
struct MinBucket {
    timestamp: i64,
    min: f64,
}

impl MinBucket {
    fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            min: f64::NAN,
        }
    }
}

impl Bucket for MinBucket {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn update_point(&mut self, _tags: &Tags, point: &Point) {
        self.min = self.min.min(point.value);
    }

    fn build(&self) -> Point {
        Point::new(self.timestamp, self.min)
    }
}

#[derive(Debug)]
struct MaxBucket {
    timestamp: i64,
    max: f64,
}

impl MaxBucket {
    fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            max: f64::NAN,
        }
    }
}

impl Bucket for MaxBucket {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn update_point(&mut self, _tags: &Tags, point: &Point) {
        self.max = self.max.max(point.value);
    }

    fn build(&self) -> Point {
        Point::new(self.timestamp, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(kind: AggregationKind, values: &[f64]) -> f64 {
        let mut bucket = kind.create_bucket(1000);
        let tags = Tags::new();
        for v in values {
            bucket.update_point(&tags, &Point::new(1000, *v));
        }
        let point = bucket.build();
        assert_eq!(point.timestamp, 1000);
        point.value
    }

    #[test]
    fn test_bucket_rules() {
        let values = [3.0, -1.0, 4.5, 2.0];

        assert_eq!(feed(AggregationKind::Sum, &values), 8.5);
        assert_eq!(feed(AggregationKind::Count, &values), 4.0);
        assert_eq!(feed(AggregationKind::Min, &values), -1.0);
        assert_eq!(feed(AggregationKind::Max, &values), 4.5);
    }

    #[test]
    fn test_empty_buckets_use_defaults() {
        assert_eq!(feed(AggregationKind::Sum, &[]), 0.0);
        assert_eq!(feed(AggregationKind::Count, &[]), 0.0);
        assert!(feed(AggregationKind::Min, &[]).is_nan());
        assert!(feed(AggregationKind::Max, &[]).is_nan());

        for kind in AggregationKind::all() {
            let built = feed(*kind, &[]);
            let empty = kind.empty_value();
            assert!(built == empty || (built.is_nan() && empty.is_nan()));
        }
    }

    #[test]
    fn test_reduce_ignores_empty_min_max() {
        assert_eq!(AggregationKind::Sum.reduce(1.5, 2.0), 3.5);
        assert_eq!(AggregationKind::Count.reduce(2.0, 3.0), 5.0);
        assert_eq!(AggregationKind::Min.reduce(f64::NAN, 2.0), 2.0);
        assert_eq!(AggregationKind::Max.reduce(7.0, f64::NAN), 7.0);
        assert!(AggregationKind::Max.reduce(f64::NAN, f64::NAN).is_nan());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("SUM".parse::<AggregationKind>().unwrap(), AggregationKind::Sum);
        assert_eq!("max".parse::<AggregationKind>().unwrap(), AggregationKind::Max);
        assert!(matches!(
            "p99".parse::<AggregationKind>(),
            Err(AggregationError::UnknownKind(_))
        ));

        let json = serde_json::to_string(&AggregationKind::Count).unwrap();
        assert_eq!(json, "\"count\"");
    }
}
