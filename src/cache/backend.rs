//! Cache backends

use crate::cache::error::CacheResult;
use crate::cache::key::{CacheKey, CachedBlock};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage for cached aggregation blocks
#[async_trait]
pub trait AggregationCache: Send + Sync {
    /// Block stored under `key`, if any
    async fn lookup(&self, key: &CacheKey) -> CacheResult<Option<CachedBlock>>;

    /// Store `block` under `key`, replacing what was there
    async fn store(&self, key: &CacheKey, block: CachedBlock) -> CacheResult<()>;
}

/// In-process cache keyed by the serialized cache key
#[derive(Debug, Default)]
pub struct MemoryCache {
    blocks: RwLock<HashMap<Vec<u8>, CachedBlock>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

#[async_trait]
impl AggregationCache for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> CacheResult<Option<CachedBlock>> {
        let bytes = key.to_bytes()?;
        Ok(self.blocks.read().get(&bytes).cloned())
    }

    async fn store(&self, key: &CacheKey, block: CachedBlock) -> CacheResult<()> {
        let bytes = key.to_bytes()?;
        self.blocks.write().insert(bytes, block);
        Ok(())
    }
}
