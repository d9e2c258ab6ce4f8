//! Points sources
//!
//! A `PointSource` is one backend shard as seen by the query layer. The wire
//! protocol behind it is the implementor's business; the core only needs the
//! points of every series of one metric key that fall in a range.

use crate::aggregation::{Point, Series};
use crate::cluster::error::SourceError;
use crate::time::TimeRange;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Points of one series returned by a shard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoints {
    pub series: Series,
    pub points: Vec<Point>,
}

/// Backend shard that can be queried for raw points
#[async_trait]
pub trait PointSource: Send + Sync {
    /// Unique shard identifier
    fn id(&self) -> &str;

    /// Fetch every series of metric `key` with points inside `range`
    ///
    /// Points may come back in any order and may repeat.
    async fn fetch(
        &self,
        key: &str,
        range: &TimeRange,
    ) -> Result<Vec<SeriesPoints>, SourceError>;
}

/// In-process shard holding its points in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    id: String,
    series: BTreeMap<Series, Vec<Point>>,
}

impl MemorySource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            series: BTreeMap::new(),
        }
    }

    /// Builder method: add points for a series
    pub fn with_points(mut self, series: Series, points: impl IntoIterator<Item = Point>) -> Self {
        self.extend(series, points);
        self
    }

    /// Add a single point
    pub fn insert(&mut self, series: Series, point: Point) {
        self.series.entry(series).or_default().push(point);
    }

    /// Add points for a series
    pub fn extend(&mut self, series: Series, points: impl IntoIterator<Item = Point>) {
        self.series.entry(series).or_default().extend(points);
    }

    /// Number of series held
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Number of points held across all series
    pub fn point_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl PointSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(
        &self,
        key: &str,
        range: &TimeRange,
    ) -> Result<Vec<SeriesPoints>, SourceError> {
        let result = self
            .series
            .iter()
            .filter(|(series, _)| series.key == key)
            .filter_map(|(series, points)| {
                let points: Vec<Point> = points
                    .iter()
                    .filter(|p| range.contains(p.timestamp))
                    .copied()
                    .collect();

                if points.is_empty() {
                    None
                } else {
                    Some(SeriesPoints {
                        series: series.clone(),
                        points,
                    })
                }
            })
            .collect();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_filters_by_range() {
        let source = MemorySource::new("shard-0")
            .with_points(
                Series::new("cpu").tag("host", "a"),
                vec![Point::new(500, 1.0), Point::new(1500, 2.0), Point::new(2500, 3.0)],
            )
            .with_points(Series::new("cpu").tag("host", "b"), vec![Point::new(5000, 4.0)]);

        assert_eq!(source.id(), "shard-0");
        assert_eq!(source.series_count(), 2);
        assert_eq!(source.point_count(), 4);

        let range = TimeRange::with_closed_start(1000, 3000).unwrap();
        let fetched = source.fetch("cpu", &range).await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].series, Series::new("cpu").tag("host", "a"));
        assert_eq!(fetched[0].points, vec![Point::new(1500, 2.0), Point::new(2500, 3.0)]);
    }

    #[tokio::test]
    async fn test_memory_source_insert() {
        let mut source = MemorySource::new("shard-1");
        let series = Series::new("mem");
        source.insert(series.clone(), Point::new(10, 1.0));
        source.insert(series.clone(), Point::new(10, 1.0));

        let range = TimeRange::with_closed_start(0, 100).unwrap();
        let fetched = source.fetch("mem", &range).await.unwrap();
        assert_eq!(fetched[0].points.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_source_filters_by_key() {
        let source = MemorySource::new("shard-2")
            .with_points(Series::new("cpu").tag("host", "a"), vec![Point::new(1500, 1.0)])
            .with_points(Series::new("mem").tag("host", "a"), vec![Point::new(1500, 1000.0)])
            .with_points(Series::new("cpu.idle"), vec![Point::new(1500, 7.0)]);

        let range = TimeRange::with_closed_start(1000, 2000).unwrap();

        let cpu = source.fetch("cpu", &range).await.unwrap();
        assert_eq!(cpu.len(), 1);
        assert_eq!(cpu[0].series, Series::new("cpu").tag("host", "a"));
        assert_eq!(cpu[0].points, vec![Point::new(1500, 1.0)]);

        assert!(source.fetch("disk", &range).await.unwrap().is_empty());
    }
}
