use crate::application::ports::clock::Clock;
use crate::application::ports::image_prefetcher::ImagePrefetcher;
use crate::application::ports::key_value_store::{keys, KeyValueStore};
use crate::domain::entities::{CacheStats, ImageCacheEntry};
use crate::shared::config::ImageCacheConfig;
use crate::shared::metrics::{CacheCounters, CounterSnapshot};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct ImageState {
    entries: HashMap<String, ImageCacheEntry>,
    total_bytes: u64,
}

/// Persisted image byte cache: base64 blobs under `image_cache_<url>` keys,
/// one metadata map under `image_cache_metadata`, strict LRU eviction under
/// a total-size cap and a lazy per-entry max age.
///
/// Every storage failure here is logged and treated as a miss. Image caching
/// is an optimization; the network is always the fallback source of truth.
pub struct ImageCacheService {
    store: Arc<dyn KeyValueStore>,
    prefetcher: Arc<dyn ImagePrefetcher>,
    clock: Arc<dyn Clock>,
    config: ImageCacheConfig,
    state: RwLock<ImageState>,
    counters: CacheCounters,
}

fn blob_key(url: &str) -> String {
    format!("{}{}", keys::IMAGE_PREFIX, url)
}

impl ImageCacheService {
    /// Restores the metadata map from the store. Absence or corruption
    /// starts the cache empty rather than failing construction.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        prefetcher: Arc<dyn ImagePrefetcher>,
        clock: Arc<dyn Clock>,
        config: ImageCacheConfig,
    ) -> Self {
        let entries: HashMap<String, ImageCacheEntry> =
            match store.get_item(keys::IMAGE_METADATA).await {
                Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                    warn!("image metadata unparseable, starting empty: {err}");
                    HashMap::new()
                }),
                Ok(None) => HashMap::new(),
                Err(err) => {
                    warn!("image metadata read failed, starting empty: {err}");
                    HashMap::new()
                }
            };
        let total_bytes = entries.values().map(|entry| entry.size_bytes).sum();

        Self {
            store,
            prefetcher,
            clock,
            config,
            state: RwLock::new(ImageState {
                entries,
                total_bytes,
            }),
            counters: CacheCounters::new(),
        }
    }

    /// True iff metadata exists, the entry is within its max age, and the
    /// blob is still present. An age-expired entry is evicted on the way out.
    pub async fn is_cached(&self, url: &str) -> bool {
        let now = self.clock.now();
        {
            let state = self.state.read().await;
            match state.entries.get(url) {
                Some(entry) if !self.is_aged_out(entry, now) => {}
                Some(_) => {
                    drop(state);
                    self.evict(url).await;
                    return false;
                }
                None => return false,
            }
        }

        match self.store.get_item(&blob_key(url)).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                // Metadata without a blob: drop the orphan.
                self.evict(url).await;
                false
            }
            Err(err) => {
                warn!("blob presence check failed for {url}: {err}");
                false
            }
        }
    }

    /// Returns the decoded bytes on a hit, bumping `last_accessed_at` so a
    /// frequently viewed image is protected from LRU eviction.
    pub async fn get_cached_image(&self, url: &str) -> Option<Vec<u8>> {
        let now = self.clock.now();
        {
            let state = self.state.read().await;
            match state.entries.get(url) {
                Some(entry) if !self.is_aged_out(entry, now) => {}
                Some(_) => {
                    drop(state);
                    self.evict(url).await;
                    self.counters.record_miss();
                    return None;
                }
                None => {
                    self.counters.record_miss();
                    return None;
                }
            }
        }

        let raw = match self.store.get_item(&blob_key(url)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.evict(url).await;
                self.counters.record_miss();
                return None;
            }
            Err(err) => {
                warn!("image blob read failed for {url}: {err}");
                self.counters.record_miss();
                return None;
            }
        };

        let bytes = match BASE64.decode(raw.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("image blob corrupt for {url}, evicting: {err}");
                self.evict(url).await;
                self.counters.record_miss();
                return None;
            }
        };

        {
            let mut state = self.state.write().await;
            if let Some(entry) = state.entries.get_mut(url) {
                entry.last_accessed_at = now;
            }
            self.persist_metadata(&state).await;
        }
        self.counters.record_hit();
        Some(bytes)
    }

    /// Stores the blob after making room under the size cap. Failures are
    /// logged and swallowed; the caller keeps its bytes either way.
    pub async fn cache_image(&self, url: &str, bytes: &[u8]) {
        let size = bytes.len() as u64;
        if size > self.config.max_total_bytes {
            warn!(
                "image {url} ({size} bytes) exceeds the cache cap, not caching"
            );
            return;
        }

        let mut state = self.state.write().await;
        self.ensure_space(&mut state, size).await;

        let encoded = BASE64.encode(bytes);
        if let Err(err) = self.store.set_item(&blob_key(url), &encoded).await {
            warn!("image blob write failed for {url}: {err}");
            return;
        }

        let now = self.clock.now();
        if let Some(previous) = state.entries.insert(
            url.to_string(),
            ImageCacheEntry {
                url: url.to_string(),
                size_bytes: size,
                cached_at: now,
                last_accessed_at: now,
            },
        ) {
            state.total_bytes = state.total_bytes.saturating_sub(previous.size_bytes);
        }
        state.total_bytes += size;
        self.persist_metadata(&state).await;
    }

    pub async fn remove_from_cache(&self, url: &str) {
        self.evict(url).await;
    }

    /// Full age sweep: removes every entry older than the max age. Invoked
    /// on the 24h interval and by the memory pressure manager.
    pub async fn cleanup(&self) -> u32 {
        let now = self.clock.now();
        let expired: Vec<String> = {
            let state = self.state.read().await;
            state
                .entries
                .values()
                .filter(|entry| self.is_aged_out(entry, now))
                .map(|entry| entry.url.clone())
                .collect()
        };

        for url in &expired {
            self.evict(url).await;
        }
        if !expired.is_empty() {
            debug!("image cache age sweep removed {} entries", expired.len());
        }
        expired.len() as u32
    }

    /// Drops the oldest `ratio` of entries by `cached_at`. Used by the
    /// memory pressure manager's store-pruning pass.
    pub async fn prune_oldest(&self, ratio: f64) -> u32 {
        let victims: Vec<String> = {
            let state = self.state.read().await;
            let count = ((state.entries.len() as f64) * ratio).ceil() as usize;
            if count == 0 {
                return 0;
            }
            let mut by_age: Vec<&ImageCacheEntry> = state.entries.values().collect();
            by_age.sort_by_key(|entry| entry.cached_at);
            by_age
                .into_iter()
                .take(count)
                .map(|entry| entry.url.clone())
                .collect()
        };

        for url in &victims {
            self.evict(url).await;
        }
        victims.len() as u32
    }

    /// Removes every prefixed blob key plus the metadata key and resets the
    /// running total.
    pub async fn clear_cache(&self) {
        let mut state = self.state.write().await;

        match self.store.get_all_keys().await {
            Ok(all_keys) => {
                let mut victims: Vec<&str> = all_keys
                    .iter()
                    .filter(|key| key.starts_with(keys::IMAGE_PREFIX))
                    .map(|key| key.as_str())
                    .collect();
                victims.push(keys::IMAGE_METADATA);
                if let Err(err) = self.store.multi_remove(&victims).await {
                    warn!("image cache clear failed: {err}");
                }
            }
            Err(err) => warn!("image cache clear could not list keys: {err}"),
        }

        state.entries.clear();
        state.total_bytes = 0;
    }

    /// Fires the platform prefetch if the url is not cached. Does not store
    /// bytes; callers wanting prefetch-then-store invoke `cache_image` too.
    pub async fn preload_image(&self, url: &str) {
        if self.is_cached(url).await {
            return;
        }
        self.prefetcher.prefetch(url).await;
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            total_bytes: state.total_bytes,
            entry_count: state.entries.len(),
            max_bytes: self.config.max_total_bytes,
        }
    }

    pub async fn total_bytes(&self) -> u64 {
        self.state.read().await.total_bytes
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// How often the scheduled age sweep should run.
    pub fn sweep_interval(&self) -> std::time::Duration {
        self.config.sweep_interval()
    }

    fn is_aged_out(&self, entry: &ImageCacheEntry, now: DateTime<Utc>) -> bool {
        let max_age =
            chrono::Duration::from_std(self.config.max_age()).unwrap_or(chrono::Duration::MAX);
        now - entry.cached_at >= max_age
    }

    /// Evicts least-recently-accessed entries until `incoming` fits under
    /// the cap, rechecking after each removal so it never over-evicts.
    async fn ensure_space(&self, state: &mut ImageState, incoming: u64) {
        while state.total_bytes + incoming > self.config.max_total_bytes {
            let victim = state
                .entries
                .values()
                .min_by_key(|entry| entry.last_accessed_at)
                .map(|entry| entry.url.clone());
            let Some(url) = victim else {
                break;
            };

            if let Some(entry) = state.entries.remove(&url) {
                state.total_bytes = state.total_bytes.saturating_sub(entry.size_bytes);
            }
            if let Err(err) = self.store.remove_item(&blob_key(&url)).await {
                warn!("evicted blob removal failed for {url}: {err}");
            }
            self.counters.record_eviction();
            debug!("evicted {url} to make room");
        }
    }

    async fn evict(&self, url: &str) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.remove(url) {
            state.total_bytes = state.total_bytes.saturating_sub(entry.size_bytes);
            self.counters.record_eviction();
        }
        if let Err(err) = self.store.remove_item(&blob_key(url)).await {
            warn!("blob removal failed for {url}: {err}");
        }
        self.persist_metadata(&state).await;
    }

    async fn persist_metadata(&self, state: &ImageState) {
        let raw = match serde_json::to_string(&state.entries) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("image metadata serialization failed: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set_item(keys::IMAGE_METADATA, &raw).await {
            warn!("image metadata write failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::clock::ManualClock;
    use crate::application::ports::image_prefetcher::NoopPrefetcher;
    use crate::infrastructure::storage::memory_store::InMemoryKeyValueStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn cache_with_cap(
        max_total_bytes: u64,
    ) -> (Arc<InMemoryKeyValueStore>, Arc<ManualClock>, ImageCacheService) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = ImageCacheConfig {
            max_total_bytes,
            ..ImageCacheConfig::default()
        };
        let cache = ImageCacheService::load(
            store.clone(),
            Arc::new(NoopPrefetcher),
            clock.clone(),
            config,
        )
        .await;
        (store, clock, cache)
    }

    #[tokio::test]
    async fn round_trip_and_stats() {
        let (_, _, cache) = cache_with_cap(1024).await;
        cache.cache_image("http://img/a", &[1, 2, 3]).await;

        assert!(cache.is_cached("http://img/a").await);
        assert_eq!(
            cache.get_cached_image("http://img/a").await,
            Some(vec![1, 2, 3])
        );

        let stats = cache.stats().await;
        assert_eq!(stats.total_bytes, 3);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.max_bytes, 1024);
    }

    #[tokio::test]
    async fn cap_evicts_least_recently_used_first() {
        let (_, clock, cache) = cache_with_cap(1000).await;

        cache.cache_image("a", &[0u8; 400]).await;
        clock.advance(ChronoDuration::seconds(1));
        cache.cache_image("b", &[0u8; 400]).await;
        clock.advance(ChronoDuration::seconds(1));

        // Reading "a" after inserting "b" makes "b" the LRU entry.
        assert!(cache.get_cached_image("a").await.is_some());
        clock.advance(ChronoDuration::seconds(1));

        cache.cache_image("c", &[0u8; 400]).await;

        assert!(cache.is_cached("a").await);
        assert!(!cache.is_cached("b").await);
        assert!(cache.is_cached("c").await);
        assert_eq!(cache.total_bytes().await, 800);
    }

    #[tokio::test]
    async fn eviction_stops_as_soon_as_there_is_room() {
        let (_, clock, cache) = cache_with_cap(1000).await;
        cache.cache_image("a", &[0u8; 600]).await;
        clock.advance(ChronoDuration::seconds(1));
        cache.cache_image("b", &[0u8; 600]).await;

        // 600 + 600 > 1000: "a" evicted, "b" alone remains.
        assert!(!cache.is_cached("a").await);
        assert!(cache.is_cached("b").await);
        assert_eq!(cache.total_bytes().await, 600);
    }

    #[tokio::test]
    async fn aged_entry_is_evicted_on_access() {
        let (_, clock, cache) = cache_with_cap(1024).await;
        cache.cache_image("a", &[1]).await;

        clock.advance(ChronoDuration::days(8));
        assert!(!cache.is_cached("a").await);
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn cleanup_sweeps_only_aged_entries() {
        let (_, clock, cache) = cache_with_cap(1024).await;
        cache.cache_image("old", &[1]).await;
        clock.advance(ChronoDuration::days(8));
        cache.cache_image("fresh", &[2]).await;

        let removed = cache.cleanup().await;
        assert_eq!(removed, 1);
        assert!(!cache.is_cached("old").await);
        assert!(cache.is_cached("fresh").await);
    }

    #[tokio::test]
    async fn clear_cache_removes_all_prefixed_keys() {
        let (store, _, cache) = cache_with_cap(1024).await;
        cache.cache_image("a", &[1]).await;
        cache.cache_image("b", &[2]).await;
        store.set_item("themeMode", "dark").await.unwrap();

        cache.clear_cache().await;

        assert_eq!(cache.total_bytes().await, 0);
        assert_eq!(cache.stats().await.entry_count, 0);
        let remaining = store.get_all_keys().await.unwrap();
        assert_eq!(remaining, vec!["themeMode".to_string()]);
    }

    #[tokio::test]
    async fn metadata_survives_reload() {
        let (store, clock, cache) = cache_with_cap(1024).await;
        cache.cache_image("a", &[1, 2, 3, 4]).await;
        drop(cache);

        let reloaded = ImageCacheService::load(
            store,
            Arc::new(NoopPrefetcher),
            clock,
            ImageCacheConfig {
                max_total_bytes: 1024,
                ..ImageCacheConfig::default()
            },
        )
        .await;
        assert!(reloaded.is_cached("a").await);
        assert_eq!(reloaded.total_bytes().await, 4);
    }

    #[tokio::test]
    async fn oversized_image_is_rejected_outright() {
        let (_, _, cache) = cache_with_cap(10).await;
        cache.cache_image("big", &[0u8; 11]).await;
        assert!(!cache.is_cached("big").await);
        assert_eq!(cache.total_bytes().await, 0);
    }

    struct CountingPrefetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImagePrefetcher for CountingPrefetcher {
        async fn prefetch(&self, _url: &str) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn preload_skips_cached_urls() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let prefetcher = Arc::new(CountingPrefetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = ImageCacheService::load(
            store,
            prefetcher.clone(),
            clock,
            ImageCacheConfig::default(),
        )
        .await;

        cache.preload_image("a").await;
        assert_eq!(prefetcher.calls.load(Ordering::SeqCst), 1);
        // Preload stores nothing.
        assert!(!cache.is_cached("a").await);

        cache.cache_image("a", &[1]).await;
        cache.preload_image("a").await;
        assert_eq!(prefetcher.calls.load(Ordering::SeqCst), 1);
    }
}
