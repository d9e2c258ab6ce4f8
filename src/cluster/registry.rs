//! Shard registry
//!
//! The set of shards a query fans out to. It is passed to the query runner
//! explicitly and swapped atomically when cluster membership changes; a
//! query takes a snapshot up front and never sees a half-updated set.

use crate::cluster::error::{ClusterError, ClusterResult};
use crate::cluster::source::PointSource;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A backend shard
#[derive(Clone)]
pub struct Shard {
    id: String,
    source: Arc<dyn PointSource>,
}

impl Shard {
    pub fn new(source: Arc<dyn PointSource>) -> Self {
        Self {
            id: source.id().to_string(),
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Arc<dyn PointSource> {
        &self.source
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard").field("id", &self.id).finish()
    }
}

/// Immutable snapshot of the shards in the cluster
#[derive(Debug, Clone, Default)]
pub struct ShardSet {
    shards: Vec<Shard>,
}

impl ShardSet {
    pub fn new(shards: Vec<Shard>) -> Self {
        Self { shards }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shard> {
        self.shards.iter()
    }
}

/// Registry holding the current shard set, if one has been published
#[derive(Debug, Default)]
pub struct ShardRegistry {
    current: RwLock<Option<Arc<ShardSet>>>,
}

impl ShardRegistry {
    /// Create a registry with no shard set (not ready)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that is ready with the given sources
    pub fn with_sources(sources: Vec<Arc<dyn PointSource>>) -> Self {
        let registry = Self::new();
        registry.update(sources);
        registry
    }

    /// Publish a new shard set, replacing the previous one
    pub fn update(&self, sources: Vec<Arc<dyn PointSource>>) {
        let set = ShardSet::new(sources.into_iter().map(Shard::new).collect());
        tracing::debug!(shards = set.len(), "Publishing shard set");
        *self.current.write() = Some(Arc::new(set));
    }

    /// Drop the current shard set; queries fail with `NotReady` until the
    /// next update
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Current shard set
    pub fn snapshot(&self) -> ClusterResult<Arc<ShardSet>> {
        self.current
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(ClusterError::NotReady)
    }
}
