//! Core data types for the aggregation engine
//!
//! - `Point`: a single raw or aggregated sample
//! - `Series`: identity of a stored input series (key + tags)
//! - `GroupKey`: identity of an output series after grouping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered tag mapping; ordering keeps serialization deterministic
pub type Tags = BTreeMap<String, String>;

/// A single time-series sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Identity of an input series as stored on a shard
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Series {
    /// Metric key (e.g., "cpu.load")
    pub key: String,
    #[serde(default)]
    pub tags: Tags,
}

impl Series {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tags: Tags::new(),
        }
    }

    /// Builder method: add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder method: add multiple tags
    pub fn tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "{{{}}}", tags.join(","))?;
        }
        Ok(())
    }
}

/// Tag mapping identifying one output series, compared by value
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub Tags);

impl GroupKey {
    /// The key every series shares when no grouping is requested
    pub fn empty() -> Self {
        Self::default()
    }

    /// Project a series' tags onto the `group_by` tag names
    ///
    /// Tags the series does not carry are left out of the key.
    pub fn for_series(series: &Series, group_by: &[String]) -> Self {
        let tags = group_by
            .iter()
            .filter_map(|name| {
                series
                    .tags
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();
        Self(tags)
    }

    pub fn tags(&self) -> &Tags {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Tags> for GroupKey {
    fn from(tags: Tags) -> Self {
        Self(tags)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", tags.join(","))
    }
}
