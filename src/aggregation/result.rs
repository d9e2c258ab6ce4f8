//! Aggregation results

use crate::aggregation::types::{GroupKey, Point, Series};
use serde::Serialize;
use std::collections::BTreeSet;

/// Finalized output of one aggregation, one entry per group key
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationResult {
    /// Groups sorted by key
    pub groups: Vec<ResultGroup>,
    pub statistics: Statistics,
}

/// Output series for one group key
#[derive(Debug, Clone, Serialize)]
pub struct ResultGroup {
    pub key: GroupKey,
    /// Input series that contributed to this group
    pub series: BTreeSet<Series>,
    /// One sample per bucket, ascending by timestamp
    pub samples: Vec<Point>,
}

/// Counters collected while feeding a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Points fed into the session
    pub points: u64,
    /// Points that fell outside every bucket window
    pub dropped: u64,
    /// Shards left out of a merged result
    pub failed_shards: u64,
}

impl Statistics {
    pub fn merge(&self, other: &Statistics) -> Statistics {
        Statistics {
            points: self.points + other.points,
            dropped: self.dropped + other.dropped,
            failed_shards: self.failed_shards + other.failed_shards,
        }
    }
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Find the group with the given key
    pub fn group(&self, key: &GroupKey) -> Option<&ResultGroup> {
        self.groups
            .binary_search_by(|group| group.key.cmp(key))
            .ok()
            .map(|index| &self.groups[index])
    }

    /// True when some shard's data is missing from this result
    pub fn is_partial(&self) -> bool {
        self.statistics.failed_shards > 0
    }

    /// Total number of output samples across all groups
    pub fn sample_count(&self) -> usize {
        self.groups.iter().map(|g| g.samples.len()).sum()
    }
}
