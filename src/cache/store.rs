//! Key-value storage behind the translation cache.
//!
//! Stores provide atomic single-key operations only. Ordering and eviction
//! live in [`super::TranslationCache`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::entry::{CacheEntry, CacheKey};
use crate::error::Result;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry under its own key
    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    /// Raise `last_accessed_at` to `accessed_at` without touching content,
    /// atomically for the key. Never moves the timestamp backwards.
    /// Returns `false` if there is no such entry.
    async fn touch(&self, key: &CacheKey, accessed_at: i64) -> Result<bool>;

    /// Returns `true` if an entry was removed
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    async fn list(&self) -> Result<Vec<CacheEntry>>;

    /// Remove everything, returning how many entries were dropped
    async fn clear(&self) -> Result<usize>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.entries.lock().insert(entry.key(), entry.clone());
        Ok(())
    }

    async fn touch(&self, key: &CacheKey, accessed_at: i64) -> Result<bool> {
        match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.last_accessed_at = entry.last_accessed_at.max(accessed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }
}
