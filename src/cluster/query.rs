//! Cluster query fan-out
//!
//! ```text
//! QueryRunner::run
//!   ├─ cache read-through (ungrouped, cacheable queries with a reader)
//!   ├─ registry snapshot
//!   ├─ JoinSet: one task per shard
//!   │    fetch key (with timeout) → per-series feeders → shard session → result
//!   ├─ join all shards
//!   └─ reduce → AggregationResult (→ cache write-back when complete)
//! ```
//!
//! Only cacheable queries touch the cache: open start, with both range
//! bounds on a bucket boundary. Their buckets are all full windows, so a
//! cached sample means the same thing whichever query produced it.

use crate::aggregation::{
    AggregationResult, BucketAggregation, GroupKey, Point, ResultGroup, Series, Statistics,
};
use crate::cache::{AggregationDefinition, CacheReader, CacheWriter};
use crate::cluster::error::{ClusterError, ClusterResult, ShardError};
use crate::cluster::reducer::{reduce, ShardOutcome};
use crate::cluster::registry::ShardRegistry;
use crate::cluster::source::PointSource;
use crate::time::{RangeResult, TimeRange};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// An aggregation query over one metric key
#[derive(Debug, Clone)]
pub struct ClusterQuery {
    /// Metric key the shards are asked about
    pub key: String,
    pub aggregation: BucketAggregation,
    pub range: TimeRange,
    /// Tag names whose values form the output group key
    pub group_by: Vec<String>,
}

impl ClusterQuery {
    pub fn new(key: impl Into<String>, aggregation: BucketAggregation, range: TimeRange) -> Self {
        Self {
            key: key.into(),
            aggregation,
            range,
            group_by: Vec::new(),
        }
    }

    /// Builder method: group output by these tags
    pub fn group_by<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Range to fetch from shards: every instant some bucket window can claim
    pub fn fetch_range(&self) -> RangeResult<TimeRange> {
        let start = (self.range.start - self.aggregation.extent()).max(0);
        TimeRange::with_closed_start(start, self.range.end)
    }

    /// True when results of this query may be cached and served from cache
    ///
    /// A closed start or an unaligned bound produces truncated windows whose
    /// samples would collide with full ones under the same cache key.
    pub fn is_cacheable(&self) -> bool {
        let size = self.aggregation.size();

        self.range.open_start
            && self.range.start.rem_euclid(size) == 0
            && self.range.end.rem_euclid(size) == 0
    }

    /// Query range split at storage block boundaries of `block_width` buckets
    pub fn split_for_blocks(&self, block_width: i64) -> RangeResult<Vec<TimeRange>> {
        self.range
            .split_at_period_boundary(self.aggregation.size().saturating_mul(block_width))
    }
}

/// Query runner configuration
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Upper bound on a single shard fetch
    pub shard_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            shard_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs aggregation queries across the registered shards
pub struct QueryRunner {
    registry: Arc<ShardRegistry>,
    config: QueryConfig,
    cache_writer: Option<CacheWriter>,
    cache_reader: Option<CacheReader>,
}

impl QueryRunner {
    pub fn new(registry: Arc<ShardRegistry>, config: QueryConfig) -> Self {
        Self {
            registry,
            config,
            cache_writer: None,
            cache_reader: None,
        }
    }

    /// Write complete results of cacheable queries back to the cache
    pub fn with_cache_writer(mut self, writer: CacheWriter) -> Self {
        self.cache_writer = Some(writer);
        self
    }

    /// Serve cached buckets of ungrouped cacheable queries
    ///
    /// Only the pieces of the range the cache cannot answer are fanned out.
    /// Grouped queries always fan out, since the cache cannot enumerate the
    /// groups a key has.
    pub fn with_cache_reader(mut self, reader: CacheReader) -> Self {
        self.cache_reader = Some(reader);
        self
    }

    /// Run a query across every shard and merge the results
    ///
    /// Waits for all shards before reducing. Dropping the returned future
    /// aborts the in-flight shard tasks.
    pub async fn run(&self, query: &ClusterQuery) -> ClusterResult<AggregationResult> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("query", %id, key = %query.key);

        self.run_inner(query).instrument(span).await
    }

    /// Run a query, giving up when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        query: &ClusterQuery,
        cancel: CancellationToken,
    ) -> ClusterResult<AggregationResult> {
        tokio::select! {
            result = self.run(query) => result,
            _ = cancel.cancelled() => {
                tracing::info!(key = %query.key, "Query cancelled");
                Err(ClusterError::Cancelled)
            }
        }
    }

    async fn run_inner(&self, query: &ClusterQuery) -> ClusterResult<AggregationResult> {
        if let Some(reader) = &self.cache_reader {
            if query.is_cacheable() && query.group_by.is_empty() {
                return self.run_cached(reader, query).await;
            }
        }

        let result = self.fan_out(query).await?;
        self.write_back(query, &result);

        Ok(result)
    }

    /// Answer from cache where possible and compute the missing pieces
    async fn run_cached(
        &self,
        reader: &CacheReader,
        query: &ClusterQuery,
    ) -> ClusterResult<AggregationResult> {
        let definition = AggregationDefinition::from(&query.aggregation);
        let series = Series::new(query.key.as_str());

        let lookup = match reader.lookup_range(&series, &definition, &query.range).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(error = %e, "Cache lookup failed, querying shards");
                let result = self.fan_out(query).await?;
                self.write_back(query, &result);
                return Ok(result);
            }
        };

        tracing::debug!(
            cached = lookup.samples.len(),
            misses = lookup.misses.len(),
            "Cache read-through"
        );

        // Cached samples inside a missed piece are recomputed with the rest of it
        let mut samples: BTreeMap<i64, f64> = lookup
            .samples
            .iter()
            .filter(|p| !lookup.misses.iter().any(|m| m.contains(p.timestamp)))
            .map(|p| (p.timestamp, p.value))
            .collect();
        let mut contributors = BTreeSet::new();
        let mut statistics = Statistics::default();

        for piece in coalesce(lookup.misses) {
            let sub = ClusterQuery {
                range: piece,
                ..query.clone()
            };

            let computed = self.fan_out(&sub).await?;
            self.write_back(&sub, &computed);

            statistics = computed.statistics.merge(&statistics);
            for group in computed.groups {
                contributors.extend(group.series);
                samples.extend(group.samples.iter().map(|p| (p.timestamp, p.value)));
            }
        }

        if samples.is_empty() {
            return Ok(AggregationResult {
                groups: Vec::new(),
                statistics,
            });
        }

        let kind = query.aggregation.kind();
        let filled: Vec<Point> = query
            .aggregation
            .layout(&query.range)
            .timestamps()
            .map(|timestamp| {
                let value = samples
                    .get(&timestamp)
                    .copied()
                    .unwrap_or_else(|| kind.empty_value());
                Point::new(timestamp, value)
            })
            .collect();

        Ok(AggregationResult {
            groups: vec![ResultGroup {
                key: GroupKey::empty(),
                series: contributors,
                samples: filled,
            }],
            statistics,
        })
    }

    /// Queue a background cache write for a complete, cacheable result
    fn write_back(&self, query: &ClusterQuery, result: &AggregationResult) {
        let Some(writer) = &self.cache_writer else {
            return;
        };

        if !query.is_cacheable() {
            tracing::debug!(range = %query.range, "Range not cacheable, skipping write-back");
            return;
        }

        if result.is_partial() {
            tracing::debug!(
                failed_shards = result.statistics.failed_shards,
                "Partial result, skipping write-back"
            );
            return;
        }

        let definition = AggregationDefinition::from(&query.aggregation);
        writer.spawn_put(query.key.clone(), definition, result.clone());
    }

    /// Query every shard for `query.range` and reduce the outcomes
    async fn fan_out(&self, query: &ClusterQuery) -> ClusterResult<AggregationResult> {
        let shards = self.registry.snapshot()?;
        if shards.is_empty() {
            return Err(ClusterError::NoShards);
        }

        let fetch_range = query.fetch_range()?;

        tracing::debug!(
            shards = shards.len(),
            range = %query.range,
            fetch = %fetch_range,
            "Fanning out query"
        );

        let mut tasks = JoinSet::new();

        for shard in shards.iter() {
            let shard_id = shard.id().to_string();
            let source = Arc::clone(shard.source());
            let query = query.clone();
            let timeout = self.config.shard_timeout;

            tasks.spawn(
                async move {
                    let result = query_shard(source, &query, fetch_range, timeout).await;
                    ShardOutcome {
                        shard: shard_id,
                        result,
                    }
                }
                .in_current_span(),
            );
        }

        let mut outcomes = Vec::with_capacity(shards.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(ShardOutcome {
                    shard: "<unknown>".to_string(),
                    result: Err(ShardError::Task(e.to_string())),
                }),
            }
        }

        let result = reduce(query.aggregation.kind(), outcomes)?;

        tracing::debug!(
            groups = result.groups.len(),
            samples = result.sample_count(),
            failed_shards = result.statistics.failed_shards,
            "Query complete"
        );

        Ok(result)
    }
}

/// Join adjacent pieces so each contiguous gap is fanned out once
fn coalesce(pieces: Vec<TimeRange>) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        match merged.last_mut() {
            Some(last) if last.end == piece.start && piece.open_start => last.end = piece.end,
            _ => merged.push(piece),
        }
    }

    merged
}

/// Fetch one shard's points and aggregate them in a shard-local session
async fn query_shard(
    source: Arc<dyn PointSource>,
    query: &ClusterQuery,
    fetch_range: TimeRange,
    timeout: Duration,
) -> Result<AggregationResult, ShardError> {
    let fetched = tokio::time::timeout(timeout, source.fetch(&query.key, &fetch_range))
        .await
        .map_err(|_| ShardError::Timeout(timeout))??;

    let session = Arc::new(query.aggregation.session(&query.range));
    let mut feeders = JoinSet::new();

    for entry in fetched {
        let session = Arc::clone(&session);
        let group = GroupKey::for_series(&entry.series, &query.group_by);

        feeders.spawn_blocking(move || {
            session.update_points(&group, std::slice::from_ref(&entry.series), &entry.points)
        });
    }

    while let Some(joined) = feeders.join_next().await {
        joined.map_err(|e| ShardError::Task(e.to_string()))??;
    }

    tracing::debug!(shard = source.id(), "Shard aggregated");

    Ok(session.result()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{AggregationKind, Tags};
    use crate::cache::{AggregationCache, CacheKey, MemoryCache};
    use crate::cluster::error::SourceError;
    use crate::cluster::source::{MemorySource, SeriesPoints};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FailingSource(&'static str);

    #[async_trait]
    impl PointSource for FailingSource {
        fn id(&self) -> &str {
            self.0
        }

        async fn fetch(
            &self,
            _key: &str,
            _range: &TimeRange,
        ) -> Result<Vec<SeriesPoints>, SourceError> {
            Err(SourceError::Backend("disk on fire".to_string()))
        }
    }

    struct SlowSource(&'static str);

    #[async_trait]
    impl PointSource for SlowSource {
        fn id(&self) -> &str {
            self.0
        }

        async fn fetch(
            &self,
            _key: &str,
            _range: &TimeRange,
        ) -> Result<Vec<SeriesPoints>, SourceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    /// Records every range it is asked for
    struct RecordingSource {
        inner: MemorySource,
        fetched: Mutex<Vec<TimeRange>>,
    }

    impl RecordingSource {
        fn new(inner: MemorySource) -> Self {
            Self {
                inner,
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<TimeRange> {
            self.fetched.lock().clone()
        }
    }

    #[async_trait]
    impl PointSource for RecordingSource {
        fn id(&self) -> &str {
            self.inner.id()
        }

        async fn fetch(
            &self,
            key: &str,
            range: &TimeRange,
        ) -> Result<Vec<SeriesPoints>, SourceError> {
            self.fetched.lock().push(*range);
            self.inner.fetch(key, range).await
        }
    }

    async fn wait_for_blocks(cache: &MemoryCache, blocks: usize) {
        for _ in 0..50 {
            if cache.len() >= blocks {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn sum_query(range: TimeRange) -> ClusterQuery {
        let aggregation = BucketAggregation::sampling(AggregationKind::Sum, 1000).unwrap();
        ClusterQuery::new("cpu", aggregation, range)
    }

    fn shard_a() -> MemorySource {
        MemorySource::new("a")
            .with_points(
                Series::new("cpu").tag("host", "a").tag("dc", "east"),
                vec![Point::new(1500, 1.0), Point::new(2500, 2.0)],
            )
            .with_points(
                Series::new("cpu").tag("host", "b").tag("dc", "east"),
                vec![Point::new(1200, 10.0)],
            )
    }

    fn shard_b() -> MemorySource {
        MemorySource::new("b").with_points(
            Series::new("cpu").tag("host", "c").tag("dc", "west"),
            vec![Point::new(1100, 5.0), Point::new(2900, 6.0), Point::new(9000, 99.0)],
        )
    }

    fn runner(sources: Vec<Arc<dyn PointSource>>) -> QueryRunner {
        let registry = Arc::new(ShardRegistry::with_sources(sources));
        QueryRunner::new(
            registry,
            QueryConfig {
                shard_timeout: Duration::from_millis(200),
            },
        )
    }

    #[test]
    fn test_fetch_range_covers_extent() {
        let aggregation = BucketAggregation::new(AggregationKind::Sum, 1000, 2000).unwrap();
        let query = ClusterQuery::new("cpu", aggregation, TimeRange::with_open_start(1000, 3000).unwrap());
        let fetch = query.fetch_range().unwrap();
        assert_eq!((fetch.start, fetch.end, fetch.open_start), (0, 3000, false));

        let query = ClusterQuery::new("cpu", aggregation, TimeRange::with_open_start(5000, 9000).unwrap());
        assert_eq!(query.fetch_range().unwrap().start, 3000);
    }

    #[test]
    fn test_is_cacheable() {
        let aligned = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());
        assert!(aligned.is_cacheable());

        let closed = sum_query(TimeRange::with_closed_start(1000, 3000).unwrap());
        assert!(!closed.is_cacheable());

        let ragged_end = sum_query(TimeRange::with_open_start(1000, 2500).unwrap());
        assert!(!ragged_end.is_cacheable());

        let ragged_start = sum_query(TimeRange::with_open_start(1500, 3000).unwrap());
        assert!(!ragged_start.is_cacheable());
    }

    #[test]
    fn test_coalesce_adjacent_pieces() {
        let pieces = vec![
            TimeRange::with_open_start(0, 2000).unwrap(),
            TimeRange::with_open_start(2000, 4000).unwrap(),
            TimeRange::with_open_start(6000, 8000).unwrap(),
        ];

        assert_eq!(
            coalesce(pieces),
            vec![
                TimeRange::with_open_start(0, 4000).unwrap(),
                TimeRange::with_open_start(6000, 8000).unwrap(),
            ]
        );
    }

    #[test]
    fn test_split_for_blocks() {
        let query = sum_query(TimeRange::with_open_start(500, 25_000).unwrap());
        let pieces = query.split_for_blocks(10).unwrap();
        let bounds: Vec<_> = pieces.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(bounds, vec![(500, 10_000), (10_000, 20_000), (20_000, 25_000)]);
    }

    #[tokio::test]
    async fn test_run_grouped_across_shards() {
        let runner = runner(vec![Arc::new(shard_a()), Arc::new(shard_b())]);
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap()).group_by(["dc"]);

        let result = runner.run(&query).await.unwrap();
        assert_eq!(result.groups.len(), 2);

        let east = &result.groups[0];
        assert_eq!(east.key.tags().get("dc").map(String::as_str), Some("east"));
        assert_eq!(east.series.len(), 2);
        assert_eq!(east.samples, vec![Point::new(2000, 11.0), Point::new(3000, 2.0)]);

        let west = &result.groups[1];
        assert_eq!(west.samples, vec![Point::new(2000, 5.0), Point::new(3000, 6.0)]);
    }

    #[tokio::test]
    async fn test_ungrouped_query_merges_all_shards() {
        let runner = runner(vec![Arc::new(shard_a()), Arc::new(shard_b())]);
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        let result = runner.run(&query).await.unwrap();
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].key, GroupKey::empty());
        assert_eq!(result.groups[0].series.len(), 3);
        assert_eq!(
            result.groups[0].samples,
            vec![Point::new(2000, 16.0), Point::new(3000, 8.0)]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_and_timeout() {
        let runner = runner(vec![
            Arc::new(shard_a()),
            Arc::new(FailingSource("broken")),
            Arc::new(SlowSource("slow")),
        ]);
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        let result = runner.run(&query).await.unwrap();
        assert_eq!(
            result.groups[0].samples,
            vec![Point::new(2000, 11.0), Point::new(3000, 2.0)]
        );
        assert_eq!(result.statistics.failed_shards, 2);
        assert!(result.is_partial());
    }

    #[tokio::test]
    async fn test_fetch_is_scoped_to_query_key() {
        let shard = shard_a().with_points(
            Series::new("mem").tag("host", "a").tag("dc", "east"),
            vec![Point::new(1500, 1000.0)],
        );
        let runner = runner(vec![Arc::new(shard)]);
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        let result = runner.run(&query).await.unwrap();
        let group = &result.groups[0];
        assert_eq!(group.samples, vec![Point::new(2000, 11.0), Point::new(3000, 2.0)]);
        assert!(group.series.iter().all(|s| s.key == "cpu"));
        assert_eq!(result.statistics.points, 3);
    }

    #[tokio::test]
    async fn test_all_shards_failed() {
        let runner = runner(vec![Arc::new(FailingSource("x")), Arc::new(SlowSource("y"))]);
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        match runner.run(&query).await {
            Err(ClusterError::AllShardsFailed { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures
                    .iter()
                    .any(|f| matches!(f.error, ShardError::Timeout(_))));
            }
            other => panic!("expected AllShardsFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_data_is_not_a_failure() {
        let runner = runner(vec![Arc::new(MemorySource::new("empty"))]);
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        let result = runner.run(&query).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_not_ready_and_no_shards() {
        let registry = Arc::new(ShardRegistry::new());
        let runner = QueryRunner::new(Arc::clone(&registry), QueryConfig::default());
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        assert!(matches!(runner.run(&query).await, Err(ClusterError::NotReady)));

        registry.update(vec![]);
        assert!(matches!(runner.run(&query).await, Err(ClusterError::NoShards)));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let registry = Arc::new(ShardRegistry::with_sources(vec![Arc::new(SlowSource("slow"))]));
        let runner = QueryRunner::new(registry, QueryConfig::default());
        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = runner.run_with_cancel(&query, cancel).await;
        assert!(matches!(result, Err(ClusterError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cache_write_back() {
        let cache = Arc::new(MemoryCache::new());
        let writer = CacheWriter::new(cache.clone(), 10).unwrap();
        let runner = runner(vec![Arc::new(shard_b())]).with_cache_writer(writer);

        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap()).group_by(["dc"]);
        runner.run(&query).await.unwrap();

        let series = Series::new("cpu").tags(Tags::from([("dc".to_string(), "west".to_string())]));
        let key = CacheKey::aligned(
            series,
            AggregationDefinition::from(&query.aggregation),
            2000,
            10,
        )
        .unwrap();

        // Write-back is fire-and-forget; poll briefly
        let mut block = None;
        for _ in 0..50 {
            block = cache.lookup(&key).await.unwrap();
            if block.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let block = block.expect("cached block");
        assert_eq!(
            block.samples(),
            vec![Point::new(2000, 5.0), Point::new(3000, 6.0)]
        );
    }

    #[tokio::test]
    async fn test_partial_result_is_not_cached() {
        let cache = Arc::new(MemoryCache::new());
        let writer = CacheWriter::new(cache.clone(), 10).unwrap();
        let runner = runner(vec![Arc::new(shard_a()), Arc::new(FailingSource("broken"))])
            .with_cache_writer(writer);

        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());
        let result = runner.run(&query).await.unwrap();
        assert!(result.is_partial());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_windows_are_not_cached() {
        let cache = Arc::new(MemoryCache::new());
        let writer = CacheWriter::new(cache.clone(), 10).unwrap();
        let runner = runner(vec![Arc::new(shard_a())]).with_cache_writer(writer);

        // Closed start: the last window stops short of the end instant
        let closed = sum_query(TimeRange::with_closed_start(1000, 3000).unwrap());
        runner.run(&closed).await.unwrap();

        // Unaligned start: the first bucket holds a partial window
        let ragged = sum_query(TimeRange::with_open_start(1500, 3000).unwrap());
        runner.run(&ragged).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());

        let aligned = sum_query(TimeRange::with_open_start(1000, 3000).unwrap());
        runner.run(&aligned).await.unwrap();
        wait_for_blocks(&cache, 1).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_read_through() {
        let cache = Arc::new(MemoryCache::new());
        let source = Arc::new(RecordingSource::new(
            shard_a().with_points(
                Series::new("cpu").tag("host", "a").tag("dc", "east"),
                vec![Point::new(5500, 7.0)],
            ),
        ));
        let runner = runner(vec![source.clone()])
            .with_cache_writer(CacheWriter::new(cache.clone(), 2).unwrap())
            .with_cache_reader(CacheReader::new(cache.clone(), 2).unwrap());

        let first = sum_query(TimeRange::with_open_start(0, 4000).unwrap());
        let computed = runner.run(&first).await.unwrap();
        assert_eq!(
            computed.groups[0].samples,
            vec![
                Point::new(1000, 0.0),
                Point::new(2000, 11.0),
                Point::new(3000, 2.0),
                Point::new(4000, 0.0),
            ]
        );
        // Blocks 0, 2000 and 4000
        wait_for_blocks(&cache, 3).await;

        // Fully cached: no shard is asked again
        let cached = runner.run(&first).await.unwrap();
        assert_eq!(cached.groups[0].samples, computed.groups[0].samples);
        assert_eq!(source.fetched().len(), 1);

        // Only the uncached tail is fetched
        let wider = sum_query(TimeRange::with_open_start(0, 6000).unwrap());
        let result = runner.run(&wider).await.unwrap();
        assert_eq!(
            source.fetched().last().copied(),
            Some(TimeRange::with_closed_start(3000, 6000).unwrap())
        );
        assert_eq!(source.fetched().len(), 2);
        assert_eq!(
            result.groups[0].samples,
            vec![
                Point::new(1000, 0.0),
                Point::new(2000, 11.0),
                Point::new(3000, 2.0),
                Point::new(4000, 0.0),
                Point::new(5000, 0.0),
                Point::new(6000, 7.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_grouped_query_bypasses_read_through() {
        let cache = Arc::new(MemoryCache::new());
        let source = Arc::new(RecordingSource::new(shard_a()));
        let runner = runner(vec![source.clone()])
            .with_cache_reader(CacheReader::new(cache, 10).unwrap());

        let query = sum_query(TimeRange::with_open_start(1000, 3000).unwrap()).group_by(["host"]);
        runner.run(&query).await.unwrap();
        runner.run(&query).await.unwrap();

        assert_eq!(source.fetched().len(), 2);
    }
}
