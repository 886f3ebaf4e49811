use crate::application::ports::clock::Clock;
use crate::application::ports::key_value_store::{keys, KeyValueStore};
use crate::domain::entities::{NewsRecord, NewsSnapshot};
use crate::shared::error::{AppError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Persisted news snapshot: the `news_cache` / `archived_news_ids` /
/// `last_fetched` triple, TTL-bound. The single source of truth for what
/// this device believes the server state is.
///
/// Reads and writes are batched into one store call each so no observer can
/// see `news` updated while `archived_news_ids` still reflects an older
/// write.
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Returns the cached snapshot, or `None` when any backing key is
    /// absent, unparseable, or the snapshot has aged past the TTL. Never
    /// errors: storage failures read as a cache miss.
    pub async fn get_snapshot(&self) -> Option<NewsSnapshot> {
        let pairs = match self
            .store
            .multi_get(&[keys::NEWS_CACHE, keys::ARCHIVED_IDS, keys::LAST_FETCHED])
            .await
        {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!("snapshot read failed, treating as miss: {err}");
                return None;
            }
        };

        let value_of = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.clone())
        };

        let news_raw = value_of(keys::NEWS_CACHE)?;
        let archived_raw = value_of(keys::ARCHIVED_IDS)?;
        let fetched_raw = value_of(keys::LAST_FETCHED)?;

        let news: Vec<NewsRecord> = match serde_json::from_str(&news_raw) {
            Ok(news) => news,
            Err(err) => {
                warn!("cached news unparseable, treating as miss: {err}");
                return None;
            }
        };
        let archived_ids: Vec<String> = match serde_json::from_str(&archived_raw) {
            Ok(ids) => ids,
            Err(err) => {
                warn!("cached archived ids unparseable, treating as miss: {err}");
                return None;
            }
        };
        let last_fetched_at = parse_millis(&fetched_raw)?;

        let snapshot = NewsSnapshot {
            news,
            archived_ids,
            last_fetched_at,
        };
        if snapshot.is_expired(self.clock.now(), self.ttl) {
            debug!("snapshot expired, forcing refetch");
            return None;
        }
        Some(snapshot)
    }

    /// Writes all three keys in one batched call, stamping the fetch time.
    /// A store failure propagates as `CacheWrite`: callers rely on the
    /// write-through having landed before they issue the remote mutation.
    pub async fn set_snapshot(&self, news: &[NewsRecord], archived_ids: &[String]) -> Result<()> {
        let news_raw = serde_json::to_string(news)?;
        let archived_raw = serde_json::to_string(archived_ids)?;
        let fetched_raw = self.clock.now().timestamp_millis().to_string();

        self.store
            .multi_set(&[
                (keys::NEWS_CACHE, news_raw),
                (keys::ARCHIVED_IDS, archived_raw),
                (keys::LAST_FETCHED, fetched_raw),
            ])
            .await
            .map_err(|err| AppError::CacheWrite(err.to_string()))
    }

    /// Checks only the timestamp key. Absence or a parse failure reads as
    /// expired, failing toward a refetch.
    pub async fn is_expired(&self) -> bool {
        let raw = match self.store.get_item(keys::LAST_FETCHED).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return true,
            Err(err) => {
                warn!("last_fetched read failed, treating as expired: {err}");
                return true;
            }
        };
        match parse_millis(&raw) {
            Some(fetched_at) => {
                let elapsed = self.clock.now() - fetched_at;
                elapsed
                    >= chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
            }
            None => true,
        }
    }

    /// Drops the snapshot keys plus session-scoped keys. Used on logout and
    /// on a manual refresh pull.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .multi_remove(&[
                keys::NEWS_CACHE,
                keys::ARCHIVED_IDS,
                keys::LAST_FETCHED,
                keys::NOTIFICATIONS,
                keys::USER,
                keys::AUTH_TOKEN,
            ])
            .await
    }
}

fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = match raw.trim().parse() {
        Ok(millis) => millis,
        Err(err) => {
            warn!("last_fetched unparseable: {err}");
            return None;
        }
    };
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::clock::ManualClock;
    use crate::infrastructure::storage::memory_store::InMemoryKeyValueStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    fn record(id: &str) -> NewsRecord {
        NewsRecord {
            id: id.to_string(),
            title: format!("Title {id}"),
            content: "Content".to_string(),
            category: "general".to_string(),
            image_url: None,
            role: "reader".to_string(),
            author_id: "a1".to_string(),
            created_at: Utc::now(),
            like_count: 0,
            view_count: 0,
            liked_by: Vec::new(),
        }
    }

    fn setup() -> (Arc<InMemoryKeyValueStore>, Arc<ManualClock>, SnapshotCache) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SnapshotCache::new(
            store.clone(),
            clock.clone(),
            Duration::from_secs(300),
        );
        (store, clock, cache)
    }

    #[tokio::test]
    async fn empty_store_reads_as_miss() {
        let (_, _, cache) = setup();
        assert!(cache.get_snapshot().await.is_none());
        assert!(cache.is_expired().await);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_, _, cache) = setup();
        let news: Vec<NewsRecord> = (0..10).map(|i| record(&format!("n{i}"))).collect();

        cache.set_snapshot(&news, &[]).await.unwrap();

        let snapshot = cache.get_snapshot().await.expect("fresh snapshot");
        assert_eq!(snapshot.news.len(), 10);
        assert_eq!(snapshot.news, news);
        assert!(snapshot.archived_ids.is_empty());
        assert!(!cache.is_expired().await);
    }

    #[tokio::test]
    async fn snapshot_expires_at_ttl_boundary() {
        let (_, clock, cache) = setup();
        cache.set_snapshot(&[record("n1")], &[]).await.unwrap();

        clock.advance(ChronoDuration::seconds(299));
        assert!(cache.get_snapshot().await.is_some());
        assert!(!cache.is_expired().await);

        clock.advance(ChronoDuration::seconds(2)); // now at 5:01
        assert!(cache.get_snapshot().await.is_none());
        assert!(cache.is_expired().await);
    }

    #[tokio::test]
    async fn unparseable_payload_reads_as_miss() {
        let (store, _, cache) = setup();
        cache.set_snapshot(&[record("n1")], &[]).await.unwrap();

        store.set_item(keys::NEWS_CACHE, "not json").await.unwrap();
        assert!(cache.get_snapshot().await.is_none());

        store.set_item(keys::LAST_FETCHED, "garbage").await.unwrap();
        assert!(cache.is_expired().await);
    }

    #[tokio::test]
    async fn clear_removes_session_keys_too() {
        let (store, _, cache) = setup();
        cache.set_snapshot(&[record("n1")], &[]).await.unwrap();
        store.set_item(keys::AUTH_TOKEN, "token").await.unwrap();
        store.set_item(keys::USER, "{}").await.unwrap();
        store.set_item(keys::THEME_MODE, "dark").await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.get_snapshot().await.is_none());
        assert_eq!(store.get_item(keys::AUTH_TOKEN).await.unwrap(), None);
        assert_eq!(store.get_item(keys::USER).await.unwrap(), None);
        // Theme survives logout.
        assert_eq!(
            store.get_item(keys::THEME_MODE).await.unwrap().as_deref(),
            Some("dark")
        );
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get_item(&self, _key: &str) -> crate::shared::error::Result<Option<String>> {
            Err(AppError::Storage("disk full".to_string()))
        }
        async fn set_item(&self, _key: &str, _value: &str) -> crate::shared::error::Result<()> {
            Err(AppError::Storage("disk full".to_string()))
        }
        async fn remove_item(&self, _key: &str) -> crate::shared::error::Result<()> {
            Err(AppError::Storage("disk full".to_string()))
        }
        async fn multi_get(
            &self,
            _keys: &[&str],
        ) -> crate::shared::error::Result<Vec<(String, Option<String>)>> {
            Err(AppError::Storage("disk full".to_string()))
        }
        async fn multi_set(&self, _pairs: &[(&str, String)]) -> crate::shared::error::Result<()> {
            Err(AppError::Storage("disk full".to_string()))
        }
        async fn multi_remove(&self, _keys: &[&str]) -> crate::shared::error::Result<()> {
            Err(AppError::Storage("disk full".to_string()))
        }
        async fn get_all_keys(&self) -> crate::shared::error::Result<Vec<String>> {
            Err(AppError::Storage("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn write_failure_is_a_typed_error_and_read_failure_a_miss() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SnapshotCache::new(Arc::new(FailingStore), clock, Duration::from_secs(300));

        let err = cache.set_snapshot(&[], &[]).await.unwrap_err();
        assert!(matches!(err, AppError::CacheWrite(_)));

        assert!(cache.get_snapshot().await.is_none());
        assert!(cache.is_expired().await);
    }
}
