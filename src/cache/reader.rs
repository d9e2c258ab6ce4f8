//! Cache lookup over a time range

use crate::aggregation::{Point, Series};
use crate::cache::backend::AggregationCache;
use crate::cache::error::{CacheError, CacheResult};
use crate::cache::key::{AggregationDefinition, CacheKey, CachedBlock};
use crate::time::TimeRange;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Cached samples for a range, plus the parts that still need computing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheLookup {
    /// Hits inside the range, ascending by timestamp
    pub samples: Vec<Point>,
    /// Pieces of the range with at least one missing sample
    pub misses: Vec<TimeRange>,
}

impl CacheLookup {
    /// True when every bucket of the range was cached
    pub fn is_complete(&self) -> bool {
        self.misses.is_empty()
    }
}

/// Reads cached blocks back for a query range
#[derive(Clone)]
pub struct CacheReader {
    cache: Arc<dyn AggregationCache>,
    block_width: i64,
}

impl CacheReader {
    pub fn new(cache: Arc<dyn AggregationCache>, block_width: i64) -> CacheResult<Self> {
        if block_width <= 0 {
            return Err(CacheError::InvalidBlockWidth(block_width));
        }

        Ok(Self { cache, block_width })
    }

    /// Look up every block touching `range`
    ///
    /// The range is split at block boundaries. Samples come from every
    /// cached block. A piece is a miss unless every multiple of the bucket
    /// size inside it has a cached sample.
    pub async fn lookup_range(
        &self,
        series: &Series,
        definition: &AggregationDefinition,
        range: &TimeRange,
    ) -> CacheResult<CacheLookup> {
        let column_width = definition.column_width(self.block_width)?;
        let pieces = range.split_at_period_boundary(column_width)?;

        let mut blocks: HashMap<i64, Option<CachedBlock>> = HashMap::new();
        let mut samples: BTreeMap<i64, f64> = BTreeMap::new();
        let mut misses = Vec::new();

        for piece in pieces {
            if piece.open_start && piece.duration() == 0 {
                continue;
            }

            for base in block_bases(&piece, column_width) {
                if let Some(block) = self.block(series, definition, base, &mut blocks).await? {
                    samples.extend(
                        block
                            .samples()
                            .into_iter()
                            .filter(|p| piece.contains(p.timestamp))
                            .map(|p| (p.timestamp, p.value)),
                    );
                }
            }

            let mut complete = true;
            for timestamp in slot_timestamps(&piece, definition.size) {
                let base = timestamp - timestamp.rem_euclid(column_width);
                let block = self.block(series, definition, base, &mut blocks).await?;
                if !block.map_or(false, |block| block.contains(timestamp)) {
                    complete = false;
                    break;
                }
            }

            if !complete {
                misses.push(piece);
            }
        }

        tracing::debug!(
            series = %series,
            hits = samples.len(),
            misses = misses.len(),
            "Cache lookup"
        );

        Ok(CacheLookup {
            samples: samples
                .into_iter()
                .map(|(timestamp, value)| Point::new(timestamp, value))
                .collect(),
            misses,
        })
    }

    /// Block at `base`, fetched at most once per lookup
    async fn block<'a>(
        &self,
        series: &Series,
        definition: &AggregationDefinition,
        base: i64,
        blocks: &'a mut HashMap<i64, Option<CachedBlock>>,
    ) -> CacheResult<Option<&'a CachedBlock>> {
        if !blocks.contains_key(&base) {
            let key = CacheKey {
                series: series.clone(),
                aggregation: *definition,
                base,
            };
            let block = self.cache.lookup(&key).await?;
            blocks.insert(base, block);
        }

        Ok(blocks.get(&base).and_then(Option::as_ref))
    }
}

/// Multiples of `size` inside `piece`
fn slot_timestamps(piece: &TimeRange, size: i64) -> impl Iterator<Item = i64> {
    let first = if piece.open_start {
        piece.start.saturating_add(1)
    } else {
        piece.start
    };
    let first = first.saturating_add((size - first.rem_euclid(size)).rem_euclid(size));

    (first..=piece.end).step_by(size.max(1) as usize)
}

/// Bases of the blocks holding timestamps of `piece`
///
/// A piece never crosses a block boundary except at its end, where the
/// boundary timestamp itself belongs to the next block.
fn block_bases(piece: &TimeRange, column_width: i64) -> Vec<i64> {
    let first = piece.start - piece.start.rem_euclid(column_width);
    let last = piece.end - piece.end.rem_euclid(column_width);

    if last != first && piece.contains(piece.end) {
        vec![first, last]
    } else {
        vec![first]
    }
}
