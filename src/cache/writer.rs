//! Cache write-back

use crate::aggregation::{AggregationResult, Point, Series};
use crate::cache::backend::AggregationCache;
use crate::cache::error::{CacheError, CacheResult};
use crate::cache::key::{AggregationDefinition, CacheKey, CachedBlock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Outcome of a cache put
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePutResult {
    /// Blocks stored
    pub blocks: usize,
    /// Samples written
    pub written: usize,
    /// Samples with no slot (timestamp not a multiple of the bucket size)
    pub skipped: usize,
}

impl CachePutResult {
    fn merge(self, other: CachePutResult) -> CachePutResult {
        CachePutResult {
            blocks: self.blocks + other.blocks,
            written: self.written + other.written,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Writes aggregated samples back to a cache, one block per column
#[derive(Clone)]
pub struct CacheWriter {
    cache: Arc<dyn AggregationCache>,
    block_width: i64,
}

impl CacheWriter {
    pub fn new(cache: Arc<dyn AggregationCache>, block_width: i64) -> CacheResult<Self> {
        if block_width <= 0 {
            return Err(CacheError::InvalidBlockWidth(block_width));
        }

        Ok(Self { cache, block_width })
    }

    pub fn block_width(&self) -> i64 {
        self.block_width
    }

    /// Store the samples of one series
    ///
    /// Samples are grouped by block and merged into whatever the block
    /// already holds.
    pub async fn put(
        &self,
        series: &Series,
        definition: &AggregationDefinition,
        samples: &[Point],
    ) -> CacheResult<CachePutResult> {
        let column_width = definition.column_width(self.block_width)?;
        let mut blocks: BTreeMap<i64, CachedBlock> = BTreeMap::new();
        let mut result = CachePutResult::default();

        for sample in samples {
            let base = sample.timestamp - sample.timestamp.rem_euclid(column_width);
            let block = blocks
                .entry(base)
                .or_insert_with(|| CachedBlock::new(base, definition.size));

            if block.insert(*sample) {
                result.written += 1;
            } else {
                result.skipped += 1;
            }
        }

        if result.skipped > 0 {
            tracing::warn!(
                series = %series,
                skipped = result.skipped,
                "Skipping samples not aligned to bucket size"
            );
        }

        for (base, block) in blocks {
            if block.is_empty() {
                continue;
            }

            let key = CacheKey {
                series: series.clone(),
                aggregation: *definition,
                base,
            };

            let block = match self.cache.lookup(&key).await? {
                Some(mut existing) => {
                    existing.merge(block);
                    existing
                }
                None => block,
            };

            self.cache.store(&key, block).await?;
            result.blocks += 1;
        }

        Ok(result)
    }

    /// Store every group of an aggregation result
    ///
    /// Each group is cached as the series `key` carrying the group's tags.
    pub async fn put_result(
        &self,
        key: &str,
        definition: &AggregationDefinition,
        result: &AggregationResult,
    ) -> CacheResult<CachePutResult> {
        let mut total = CachePutResult::default();

        for group in &result.groups {
            let series = Series::new(key).tags(group.key.tags().clone());
            let put = self.put(&series, definition, &group.samples).await?;
            total = total.merge(put);
        }

        tracing::debug!(
            key,
            blocks = total.blocks,
            written = total.written,
            "Cached aggregation result"
        );

        Ok(total)
    }

    /// Write a result in the background; failures are logged
    pub fn spawn_put(
        &self,
        key: String,
        definition: AggregationDefinition,
        result: AggregationResult,
    ) -> JoinHandle<CacheResult<CachePutResult>> {
        let writer = self.clone();

        tokio::spawn(async move {
            let outcome = writer.put_result(&key, &definition, &result).await;
            if let Err(e) = &outcome {
                tracing::error!(key = %key, error = %e, "Cache write-back failed");
            }
            outcome
        })
    }
}
