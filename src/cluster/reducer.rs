//! Shard result reducer
//!
//! Merges per-shard aggregation results into one. Shards may overlap in
//! time, so samples at the same timestamp are combined with the
//! aggregation's own rule instead of being concatenated.

use crate::aggregation::{
    AggregationKind, AggregationResult, GroupKey, Point, ResultGroup, Series, Statistics,
};
use crate::cluster::error::{ClusterError, ClusterResult, ShardError, ShardFailure};
use std::collections::{BTreeMap, BTreeSet};

/// Result (or failure) of one shard sub-query
#[derive(Debug)]
pub struct ShardOutcome {
    pub shard: String,
    pub result: Result<AggregationResult, ShardError>,
}

#[derive(Default)]
struct MergedGroup {
    series: BTreeSet<Series>,
    samples: BTreeMap<i64, f64>,
}

/// Merge shard outcomes
///
/// Failed shards are logged, left out and counted in
/// `statistics.failed_shards`. The query fails only when there are no shards
/// at all or every shard failed. Outcomes are merged in shard
/// id order so floating point reductions are reproducible.
pub fn reduce(kind: AggregationKind, mut outcomes: Vec<ShardOutcome>) -> ClusterResult<AggregationResult> {
    if outcomes.is_empty() {
        return Err(ClusterError::NoShards);
    }

    outcomes.sort_by(|a, b| a.shard.cmp(&b.shard));

    let total = outcomes.len();
    let mut failures = Vec::new();
    let mut merged: BTreeMap<GroupKey, MergedGroup> = BTreeMap::new();
    let mut statistics = Statistics::default();

    for outcome in outcomes {
        let result = match outcome.result {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(shard = %outcome.shard, %error, "Shard failed, excluding from result");
                failures.push(ShardFailure {
                    shard: outcome.shard,
                    error,
                });
                continue;
            }
        };

        statistics = statistics.merge(&result.statistics);

        for group in result.groups {
            let entry = merged.entry(group.key).or_default();
            entry.series.extend(group.series);

            for sample in group.samples {
                entry
                    .samples
                    .entry(sample.timestamp)
                    .and_modify(|value| *value = kind.reduce(*value, sample.value))
                    .or_insert(sample.value);
            }
        }
    }

    if failures.len() == total {
        return Err(ClusterError::AllShardsFailed { failures });
    }

    if !failures.is_empty() {
        tracing::warn!(
            failed = failures.len(),
            total,
            "Returning partial result"
        );
    }

    let groups = merged
        .into_iter()
        .map(|(key, group)| ResultGroup {
            key,
            series: group.series,
            samples: group
                .samples
                .into_iter()
                .map(|(timestamp, value)| Point::new(timestamp, value))
                .collect(),
        })
        .collect();

    statistics.failed_shards += failures.len() as u64;

    Ok(AggregationResult { groups, statistics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Tags;
    use crate::cluster::error::SourceError;

    fn key(host: &str) -> GroupKey {
        GroupKey::from(Tags::from([("host".to_string(), host.to_string())]))
    }

    fn shard(id: &str, groups: Vec<(GroupKey, Series, Vec<(i64, f64)>)>) -> ShardOutcome {
        let groups = groups
            .into_iter()
            .map(|(key, series, samples)| ResultGroup {
                key,
                series: BTreeSet::from([series]),
                samples: samples.into_iter().map(|(t, v)| Point::new(t, v)).collect(),
            })
            .collect();

        ShardOutcome {
            shard: id.to_string(),
            result: Ok(AggregationResult {
                groups,
                statistics: Statistics {
                    points: 1,
                    ..Statistics::default()
                },
            }),
        }
    }

    fn failed(id: &str) -> ShardOutcome {
        ShardOutcome {
            shard: id.to_string(),
            result: Err(SourceError::Unavailable("connection refused".to_string()).into()),
        }
    }

    #[test]
    fn test_overlapping_shards_are_reduced() {
        let s1 = Series::new("cpu").tag("host", "a").tag("core", "0");
        let s2 = Series::new("cpu").tag("host", "a").tag("core", "1");

        let outcomes = vec![
            shard("b", vec![(key("a"), s2.clone(), vec![(2000, 1.0), (3000, 4.0)])]),
            shard("a", vec![(key("a"), s1.clone(), vec![(1000, 2.0), (2000, 3.0)])]),
        ];

        let result = reduce(AggregationKind::Sum, outcomes).unwrap();
        assert_eq!(result.groups.len(), 1);

        let group = &result.groups[0];
        assert_eq!(group.series, BTreeSet::from([s1, s2]));
        assert_eq!(
            group.samples,
            vec![Point::new(1000, 2.0), Point::new(2000, 4.0), Point::new(3000, 4.0)]
        );
        assert_eq!(result.statistics.points, 2);
    }

    #[test]
    fn test_max_reduction_ignores_empty_buckets() {
        let series = Series::new("latency");
        let outcomes = vec![
            shard("a", vec![(GroupKey::empty(), series.clone(), vec![(1000, f64::NAN), (2000, 5.0)])]),
            shard("b", vec![(GroupKey::empty(), series, vec![(1000, 7.0), (2000, 3.0)])]),
        ];

        let result = reduce(AggregationKind::Max, outcomes).unwrap();
        assert_eq!(
            result.groups[0].samples,
            vec![Point::new(1000, 7.0), Point::new(2000, 5.0)]
        );
    }

    #[test]
    fn test_groups_ordered_by_key() {
        let outcomes = vec![
            shard("a", vec![(key("z"), Series::new("cpu").tag("host", "z"), vec![(1000, 1.0)])]),
            shard("b", vec![(key("m"), Series::new("cpu").tag("host", "m"), vec![(1000, 1.0)])]),
        ];

        let result = reduce(AggregationKind::Count, outcomes).unwrap();
        let keys: Vec<_> = result.groups.iter().map(|g| g.key.clone()).collect();
        assert_eq!(keys, vec![key("m"), key("z")]);
    }

    #[test]
    fn test_partial_failure_is_excluded() {
        let outcomes = vec![
            failed("a"),
            shard("b", vec![(GroupKey::empty(), Series::new("cpu"), vec![(1000, 1.5)])]),
        ];

        let result = reduce(AggregationKind::Sum, outcomes).unwrap();
        assert_eq!(result.groups[0].samples, vec![Point::new(1000, 1.5)]);
        assert_eq!(result.statistics.failed_shards, 1);
        assert!(result.is_partial());
    }

    #[test]
    fn test_all_failed_is_an_error() {
        let err = reduce(AggregationKind::Sum, vec![failed("a"), failed("b")]).unwrap_err();

        match err {
            ClusterError::AllShardsFailed { failures } => {
                let shards: Vec<_> = failures.iter().map(|f| f.shard.as_str()).collect();
                assert_eq!(shards, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_shards() {
        assert!(matches!(
            reduce(AggregationKind::Sum, vec![]),
            Err(ClusterError::NoShards)
        ));
    }

    #[test]
    fn test_empty_success_is_not_a_failure() {
        let outcomes = vec![ShardOutcome {
            shard: "a".to_string(),
            result: Ok(AggregationResult::default()),
        }];

        let result = reduce(AggregationKind::Sum, outcomes).unwrap();
        assert!(result.is_empty());
        assert!(!result.is_partial());
    }
}
