//! In-process cache store.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::{CacheError, CacheKey, CacheStore};
use crate::http::ResponseRecord;

/// A thread-safe, non-persistent cache store.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<CacheKey, ResponseRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Option<ResponseRecord> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    async fn put(&self, key: &CacheKey, record: &ResponseRecord) -> Result<(), CacheError> {
        self.inner.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let removed = self.inner.len();
        self.inner.clear();
        Ok(removed)
    }
}
