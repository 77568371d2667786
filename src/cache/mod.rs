//! Translation cache with LRU eviction.
//!
//! Reads fail open: a storage error is logged and treated as a miss. Writes
//! fail closed and return the error, so a finished translation is never
//! dropped silently.

pub mod decision;
pub mod entry;
pub mod file_store;
pub mod store;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub use decision::{decide, CacheAction, CacheDecision, DecisionReason};
pub use entry::{content_hash, CacheEntry, CacheKey};
pub use file_store::FileStore;
pub use store::{CacheStore, MemoryStore};

use crate::config::CacheConfig;
use crate::error::Result;

/// Result of [`TranslationCache::get`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub hit: bool,
    pub entry: Option<CacheEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    pub auto_evict: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self { auto_evict: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    /// `createdAt` of the oldest entry
    pub oldest_entry: Option<i64>,
    /// `createdAt` of the newest entry
    pub newest_entry: Option<i64>,
    pub total_tokens_used: u64,
    pub total_estimated_cost: f64,
}

pub struct TranslationCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    last_timestamp: AtomicI64,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            last_timestamp: AtomicI64::new(0),
        }
    }

    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// File-backed cache when `cache_dir` is set, in-memory otherwise
    pub async fn open(config: CacheConfig) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileStore::open(dir).await?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(store, config))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Wall-clock milliseconds, strictly increasing across calls
    fn next_timestamp(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let mut last = self.last_timestamp.load(Ordering::SeqCst);
        loop {
            let next = wall.max(last + 1);
            match self
                .last_timestamp
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    pub async fn get(&self, course_id: &str, lecture_id: &str) -> CacheLookup {
        let key = CacheKey::new(course_id, lecture_id);
        match self.store.get(&key).await {
            Ok(Some(entry)) => CacheLookup {
                hit: true,
                entry: Some(entry),
            },
            Ok(None) => CacheLookup { hit: false, entry: None },
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
                CacheLookup { hit: false, entry: None }
            }
        }
    }

    /// Store with the configured eviction setting
    pub async fn set(&self, entry: CacheEntry) -> Result<CacheEntry> {
        let options = SetOptions {
            auto_evict: self.config.auto_evict,
        };
        self.set_with_options(entry, options).await
    }

    /// Upsert by key. Both timestamps are reset: a write is a fresh translation.
    pub async fn set_with_options(&self, mut entry: CacheEntry, options: SetOptions) -> Result<CacheEntry> {
        let now = self.next_timestamp();
        entry.created_at = now;
        entry.last_accessed_at = now;

        self.store.put(&entry).await?;
        debug!("Cached translation for {} ({} bytes)", entry.key(), entry.size_bytes());

        if options.auto_evict {
            let evicted = self.evict_if_needed().await?;
            if evicted.contains(&entry.key()) {
                warn!("Entry {} alone exceeds the cache bounds and was evicted", entry.key());
            }
        }
        Ok(entry)
    }

    pub async fn delete(&self, course_id: &str, lecture_id: &str) -> Result<bool> {
        let key = CacheKey::new(course_id, lecture_id);
        let removed = self.store.delete(&key).await?;
        if removed {
            info!("Removed cached translation {}", key);
        }
        Ok(removed)
    }

    /// Mark an entry as just used. Returns `false` if there is no such entry.
    pub async fn touch(&self, course_id: &str, lecture_id: &str) -> Result<bool> {
        let key = CacheKey::new(course_id, lecture_id);
        self.store.touch(&key, self.next_timestamp()).await
    }

    pub async fn decide(&self, course_id: &str, lecture_id: &str, force: bool) -> CacheDecision {
        let lookup = self.get(course_id, lecture_id).await;
        let decision = decide(lookup.entry, force);
        info!(
            "Cache decision for {}/{}: {:?} ({})",
            course_id,
            lecture_id,
            decision.decision,
            decision.reason.as_str()
        );
        decision
    }

    /// Entries, most recently accessed first
    pub async fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = self.store.list().await?;
        entries.sort_by(|a, b| b.lru_order().cmp(&a.lru_order()));
        Ok(entries)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let entries = self.store.list().await?;
        Ok(CacheStats {
            total_entries: entries.len(),
            total_size_bytes: entries.iter().map(CacheEntry::size_bytes).sum(),
            oldest_entry: entries.iter().map(|e| e.created_at).min(),
            newest_entry: entries.iter().map(|e| e.created_at).max(),
            total_tokens_used: entries.iter().map(|e| e.tokens_used).sum(),
            total_estimated_cost: entries.iter().map(|e| e.estimated_cost).sum(),
        })
    }

    pub async fn clear(&self) -> Result<usize> {
        let removed = self.store.clear().await?;
        info!("Cleared {} cached translations", removed);
        Ok(removed)
    }

    /// Drop least recently used entries until both bounds hold.
    /// Returns the evicted keys, oldest first.
    pub async fn evict_if_needed(&self) -> Result<Vec<CacheKey>> {
        let mut entries: Vec<(CacheEntry, u64)> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|e| {
                let size = e.size_bytes();
                (e, size)
            })
            .collect();
        entries.sort_by_key(|(e, _)| e.lru_order());

        let mut count = entries.len();
        let mut total_size: u64 = entries.iter().map(|(_, size)| size).sum();
        let mut evicted = Vec::new();

        for (entry, size) in &entries {
            if count <= self.config.max_entries && total_size <= self.config.max_size_bytes {
                break;
            }
            let key = entry.key();
            self.store.delete(&key).await?;
            count -= 1;
            total_size = total_size.saturating_sub(*size);
            evicted.push(key);
        }

        if !evicted.is_empty() {
            info!(
                "Evicted {} cache entries, {} remain ({} bytes)",
                evicted.len(),
                count,
                total_size
            );
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use async_trait::async_trait;

    /// Memory store that yields before every read, so other futures run in between
    #[derive(Default)]
    struct YieldingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl CacheStore for YieldingStore {
        async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
            tokio::task::yield_now().await;
            self.inner.get(key).await
        }

        async fn put(&self, entry: &CacheEntry) -> Result<()> {
            self.inner.put(entry).await
        }

        async fn touch(&self, key: &CacheKey, accessed_at: i64) -> Result<bool> {
            tokio::task::yield_now().await;
            self.inner.touch(key, accessed_at).await
        }

        async fn delete(&self, key: &CacheKey) -> Result<bool> {
            self.inner.delete(key).await
        }

        async fn list(&self) -> Result<Vec<CacheEntry>> {
            self.inner.list().await
        }

        async fn clear(&self) -> Result<usize> {
            self.inner.clear().await
        }
    }

    fn entry(lecture: &str, body: &str) -> CacheEntry {
        CacheEntry {
            course_id: "course".into(),
            lecture_id: lecture.into(),
            course_name: None,
            lecture_name: None,
            original_hash: content_hash(body),
            translated_vtt: body.into(),
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".into(),
            tokens_used: 100,
            estimated_cost: 0.5,
            created_at: 0,
            last_accessed_at: 0,
        }
    }

    fn cache(max_entries: usize, max_size_bytes: u64) -> TranslationCache {
        TranslationCache::in_memory(CacheConfig {
            max_entries,
            max_size_bytes,
            ..CacheConfig::default()
        })
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache(10, u64::MAX);
        let stored = cache.set(entry("l1", "WEBVTT\n\n")).await.unwrap();
        assert!(stored.created_at > 0);
        assert_eq!(stored.created_at, stored.last_accessed_at);

        let lookup = cache.get("course", "l1").await;
        assert!(lookup.hit);
        assert_eq!(lookup.entry, Some(stored));
        assert!(!cache.get("course", "l2").await.hit);
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let cache = cache(10, u64::MAX);
        let a = cache.set(entry("a", "x")).await.unwrap();
        let b = cache.set(entry("b", "x")).await.unwrap();
        assert!(b.created_at > a.created_at);
    }

    #[tokio::test]
    async fn test_count_bound_keeps_most_recent() {
        let cache = cache(3, u64::MAX);
        for i in 0..5 {
            cache.set(entry(&format!("l{}", i), "x")).await.unwrap();
        }
        let ids: Vec<String> = cache.list().await.unwrap().into_iter().map(|e| e.lecture_id).collect();
        assert_eq!(ids, vec!["l4", "l3", "l2"]);
    }

    #[tokio::test]
    async fn test_touch_protects_from_eviction() {
        let cache = cache(2, u64::MAX);
        cache.set(entry("old", "x")).await.unwrap();
        cache.set(entry("mid", "x")).await.unwrap();
        assert!(cache.touch("course", "old").await.unwrap());
        cache.set(entry("new", "x")).await.unwrap();

        assert!(cache.get("course", "old").await.hit);
        assert!(!cache.get("course", "mid").await.hit);
        assert!(!cache.touch("course", "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_racing_set_keeps_new_content() {
        let cache = TranslationCache::new(Arc::new(YieldingStore::default()), CacheConfig::default());
        cache.set(entry("l", "old")).await.unwrap();

        let (touched, stored) = tokio::join!(cache.touch("course", "l"), cache.set(entry("l", "new")));
        assert!(touched.unwrap());
        let stored = stored.unwrap();

        let current = cache.get("course", "l").await.entry.unwrap();
        assert_eq!(current.translated_vtt, "new");
        assert_eq!(current.created_at, stored.created_at);
        assert_eq!(current.last_accessed_at, stored.last_accessed_at);
    }

    #[tokio::test]
    async fn test_size_bound() {
        let body = "WEBVTT\n\n".to_string() + &"a".repeat(1_000);
        let one = entry("probe", &body).size_bytes();
        let cache = cache(100, one * 2 + one / 2);

        for i in 0..4 {
            cache.set(entry(&format!("l{}", i), &body)).await.unwrap();
        }
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert!(stats.total_size_bytes <= cache.config().max_size_bytes);
    }

    #[tokio::test]
    async fn test_auto_evict_can_be_disabled() {
        let cache = cache(1, u64::MAX);
        let options = SetOptions { auto_evict: false };
        cache.set_with_options(entry("a", "x"), options).await.unwrap();
        cache.set_with_options(entry("b", "x"), options).await.unwrap();
        assert_eq!(cache.stats().await.unwrap().total_entries, 2);

        let evicted = cache.evict_if_needed().await.unwrap();
        assert_eq!(evicted, vec![CacheKey::new("course", "a")]);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let cache = cache(10, u64::MAX);
        let a = cache.set(entry("a", "x")).await.unwrap();
        let b = cache.set(entry("b", "y")).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_tokens_used, 200);
        assert_eq!(stats.oldest_entry, Some(a.created_at));
        assert_eq!(stats.newest_entry, Some(b.created_at));

        assert!(cache.delete("course", "a").await.unwrap());
        assert!(!cache.delete("course", "a").await.unwrap());
        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_retranslation_overwrites_in_place() {
        let cache = cache(10, u64::MAX);
        cache.set(entry("l", "first")).await.unwrap();
        cache.set(entry("l", "second")).await.unwrap();

        let entries = cache.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].translated_vtt, "second");
        assert_eq!(entries[0].original_hash, content_hash("second"));
    }
}
