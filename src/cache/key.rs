//! Cache addressing
//!
//! A cached block holds `block_width` consecutive samples of one series
//! under one aggregation definition. The block key is the series, the
//! definition and the block base, so any difference in the three is a miss.

use crate::aggregation::{AggregationKind, BucketAggregation, Point, Series};
use crate::cache::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of an aggregation for caching purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationDefinition {
    pub kind: AggregationKind,
    pub size: i64,
    pub extent: i64,
}

impl From<&BucketAggregation> for AggregationDefinition {
    fn from(aggregation: &BucketAggregation) -> Self {
        Self {
            kind: aggregation.kind(),
            size: aggregation.size(),
            extent: aggregation.extent(),
        }
    }
}

impl AggregationDefinition {
    /// Time covered by one block of `block_width` samples
    pub fn column_width(&self, block_width: i64) -> CacheResult<i64> {
        if block_width <= 0 {
            return Err(CacheError::InvalidBlockWidth(block_width));
        }

        self.size
            .checked_mul(block_width)
            .ok_or(CacheError::InvalidBlockWidth(block_width))
    }
}

/// Key of one cached block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub series: Series,
    pub aggregation: AggregationDefinition,
    /// Start of the block, a multiple of the column width
    pub base: i64,
}

impl CacheKey {
    /// Key of the block containing `timestamp`
    pub fn aligned(
        series: Series,
        aggregation: AggregationDefinition,
        timestamp: i64,
        block_width: i64,
    ) -> CacheResult<Self> {
        let column_width = aggregation.column_width(block_width)?;

        Ok(Self {
            series,
            aggregation,
            base: timestamp - timestamp.rem_euclid(column_width),
        })
    }

    pub fn to_bytes(&self) -> CacheResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> CacheResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Samples of one block, stored by slot index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBlock {
    pub base: i64,
    /// Bucket size; slot `i` holds the sample at `base + i * width`
    pub width: i64,
    pub values: BTreeMap<u32, f64>,
}

impl CachedBlock {
    pub fn new(base: i64, width: i64) -> Self {
        Self {
            base,
            width,
            values: BTreeMap::new(),
        }
    }

    /// Slot index of `timestamp`, if it lands exactly on a slot at or after `base`
    pub fn slot(&self, timestamp: i64) -> Option<u32> {
        let offset = timestamp.checked_sub(self.base)?;
        if offset < 0 || self.width <= 0 || offset % self.width != 0 {
            return None;
        }

        u32::try_from(offset / self.width).ok()
    }

    /// Store a sample; returns false if the timestamp has no slot
    pub fn insert(&mut self, sample: Point) -> bool {
        match self.slot(sample.timestamp) {
            Some(slot) => {
                self.values.insert(slot, sample.value);
                true
            }
            None => false,
        }
    }

    /// True if a sample is stored at `timestamp`
    pub fn contains(&self, timestamp: i64) -> bool {
        self.slot(timestamp)
            .map_or(false, |slot| self.values.contains_key(&slot))
    }

    /// Overlay another block's values onto this one
    pub fn merge(&mut self, other: CachedBlock) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Samples in ascending timestamp order
    pub fn samples(&self) -> Vec<Point> {
        self.values
            .iter()
            .map(|(slot, value)| Point::new(self.base + i64::from(*slot) * self.width, *value))
            .collect()
    }
}
