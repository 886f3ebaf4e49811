use crate::application::ports::clock::Clock;
use crate::application::ports::key_value_store::{keys, KeyValueStore};
use crate::domain::entities::BookmarkMetadata;
use crate::shared::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Bookmark metadata map persisted under `bookmark_metadata`, keyed by news
/// id. Writes are not transactional with the archived id set; callers
/// resolve drift through `reconcile`.
pub struct BookmarkMetadataStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl BookmarkMetadataStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reads the whole map. Absence and corruption both read as empty.
    pub async fn load(&self) -> HashMap<String, BookmarkMetadata> {
        match self.store.get_item(keys::BOOKMARK_METADATA).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("bookmark metadata unparseable, starting empty: {err}");
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(err) => {
                warn!("bookmark metadata read failed, starting empty: {err}");
                HashMap::new()
            }
        }
    }

    pub async fn get(&self, news_id: &str) -> Option<BookmarkMetadata> {
        self.load().await.remove(news_id)
    }

    pub async fn upsert(&self, news_id: &str) -> Result<()> {
        let mut map = self.load().await;
        map.entry(news_id.to_string())
            .or_insert_with(|| BookmarkMetadata::new(news_id, self.clock.now()));
        self.persist(&map).await
    }

    pub async fn remove(&self, news_id: &str) -> Result<()> {
        let mut map = self.load().await;
        if map.remove(news_id).is_some() {
            self.persist(&map).await?;
        }
        Ok(())
    }

    /// Re-derives the map from the authoritative archived id set: inserts a
    /// fresh entry for every archived id that lacks one and drops orphans.
    pub async fn reconcile(&self, archived_ids: &[String]) -> Result<()> {
        let mut map = self.load().await;
        let mut changed = false;

        map.retain(|id, _| {
            let keep = archived_ids.iter().any(|archived| archived == id);
            changed |= !keep;
            keep
        });
        for id in archived_ids {
            map.entry(id.clone()).or_insert_with(|| {
                changed = true;
                BookmarkMetadata::new(id, self.clock.now())
            });
        }

        if changed {
            self.persist(&map).await?;
        }
        Ok(())
    }

    async fn persist(&self, map: &HashMap<String, BookmarkMetadata>) -> Result<()> {
        let raw = serde_json::to_string(map)?;
        self.store
            .set_item(keys::BOOKMARK_METADATA, &raw)
            .await
            .map_err(|err| AppError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::clock::ManualClock;
    use crate::infrastructure::storage::memory_store::InMemoryKeyValueStore;
    use chrono::Utc;

    fn store() -> BookmarkMetadataStore {
        BookmarkMetadataStore::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let bookmarks = store();
        bookmarks.upsert("n1").await.unwrap();
        let first = bookmarks.get("n1").await.unwrap();

        bookmarks.upsert("n1").await.unwrap();
        let second = bookmarks.get("n1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(bookmarks.load().await.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_derives_map_from_archived_ids() {
        let bookmarks = store();
        bookmarks.upsert("stale").await.unwrap();

        let archived = vec!["n1".to_string(), "n2".to_string()];
        bookmarks.reconcile(&archived).await.unwrap();

        let map = bookmarks.load().await;
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("n1"));
        assert!(map.contains_key("n2"));
        assert!(!map.contains_key("stale"));
    }

    #[tokio::test]
    async fn reconcile_persists_a_same_size_replacement() {
        let bookmarks = store();
        bookmarks.upsert("a").await.unwrap();
        bookmarks.upsert("b").await.unwrap();

        // Another device archived two ids and unarchived ours between
        // syncs: the set changed but its size did not.
        let archived = vec!["c".to_string(), "d".to_string()];
        bookmarks.reconcile(&archived).await.unwrap();

        let map = bookmarks.load().await;
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("c"));
        assert!(map.contains_key("d"));
        assert!(!map.contains_key("a"));
        assert!(!map.contains_key("b"));
    }
}
