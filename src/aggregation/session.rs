//! Aggregation session
//!
//! Per-query mutable state: one bucket sequence per group key, fed
//! concurrently by independent producers and finalized exactly once.
//!
//! # Locking
//!
//! - `gate` is held shared for the duration of every update and exclusively
//!   by `result()`, so finalizing waits for in-flight updates and rejects
//!   later ones.
//! - `groups` is locked only long enough to find or create a group.
//! - Each group's state has its own mutex; updates to different groups never
//!   wait on each other.

use crate::aggregation::engine::BucketLayout;
use crate::aggregation::error::AggregationError;
use crate::aggregation::kind::{AggregationKind, Bucket};
use crate::aggregation::result::{AggregationResult, ResultGroup, Statistics};
use crate::aggregation::types::{GroupKey, Point, Series};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct GroupState {
    series: BTreeSet<Series>,
    /// Buckets by index, created the first time a point maps into them
    buckets: BTreeMap<usize, Box<dyn Bucket>>,
}

/// Mutable aggregation state for one query
#[derive(Debug)]
pub struct AggregationSession {
    kind: AggregationKind,
    layout: BucketLayout,
    /// `true` once finalized
    gate: RwLock<bool>,
    groups: Mutex<BTreeMap<GroupKey, Arc<Mutex<GroupState>>>>,
    points: AtomicU64,
    dropped: AtomicU64,
}

impl AggregationSession {
    pub(crate) fn new(kind: AggregationKind, layout: BucketLayout) -> Self {
        Self {
            kind,
            layout,
            gate: RwLock::new(false),
            groups: Mutex::new(BTreeMap::new()),
            points: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// Feed points from `series` into the bucket sequence of `group`
    ///
    /// Safe to call concurrently. Points outside every bucket window are
    /// dropped and counted in the session statistics. Fails with
    /// `SessionFinalized` after `result()` has been called.
    pub fn update_points(
        &self,
        group: &GroupKey,
        series: &[Series],
        points: &[Point],
    ) -> Result<(), AggregationError> {
        let finalized = self.gate.read();
        if *finalized {
            return Err(AggregationError::SessionFinalized);
        }

        let state = self.group_state(group);
        let mut state = state.lock();

        state.series.extend(series.iter().cloned());

        let mut dropped = 0u64;

        for point in points {
            let matching = self.layout.matching(point.timestamp);

            if matching.is_empty() {
                dropped += 1;
                continue;
            }

            for index in matching {
                let layout = &self.layout;
                let kind = self.kind;
                state
                    .buckets
                    .entry(index)
                    .or_insert_with(|| kind.create_bucket(layout.timestamp(index)))
                    .update_point(group.tags(), point);
            }
        }

        self.points.fetch_add(points.len() as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped, Ordering::Relaxed);

        Ok(())
    }

    fn group_state(&self, group: &GroupKey) -> Arc<Mutex<GroupState>> {
        let mut groups = self.groups.lock();

        if let Some(state) = groups.get(group) {
            return Arc::clone(state);
        }

        let state = Arc::new(Mutex::new(GroupState::default()));
        groups.insert(group.clone(), Arc::clone(&state));
        state
    }

    /// Finalize the session and build the result
    ///
    /// Groups come back sorted by group key and samples ascending by
    /// timestamp, one sample per bucket. Only the first call succeeds.
    pub fn result(&self) -> Result<AggregationResult, AggregationError> {
        let mut finalized = self.gate.write();
        if *finalized {
            return Err(AggregationError::SessionFinalized);
        }
        *finalized = true;

        let groups = std::mem::take(&mut *self.groups.lock());
        let mut result = Vec::with_capacity(groups.len());

        for (key, state) in groups {
            let mut state = state.lock();

            let samples = (0..self.layout.len())
                .map(|index| match state.buckets.get(&index) {
                    Some(bucket) => bucket.build(),
                    None => Point::new(self.layout.timestamp(index), self.kind.empty_value()),
                })
                .collect();

            result.push(ResultGroup {
                key,
                series: std::mem::take(&mut state.series),
                samples,
            });
        }

        let statistics = Statistics {
            points: self.points.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed_shards: 0,
        };

        tracing::debug!(
            groups = result.len(),
            points = statistics.points,
            dropped = statistics.dropped,
            "Aggregation session finalized"
        );

        Ok(AggregationResult {
            groups: result,
            statistics,
        })
    }
}
