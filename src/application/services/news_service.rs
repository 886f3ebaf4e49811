use crate::application::ports::news_api::{NewsApi, NewsQuery, UserPreferences};
use crate::domain::entities::NewsRecord;
use crate::infrastructure::cache::request_cache::RequestCache;
use crate::infrastructure::cache::snapshot_cache::SnapshotCache;
use crate::infrastructure::storage::bookmark_store::BookmarkMetadataStore;
use crate::shared::error::{AppError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// In-memory projection of the snapshot cache: what the screens read
/// synchronously. The cache stays the source of truth; this is a
/// read-through/write-through view of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsState {
    pub news: Vec<NewsRecord>,
    pub archived_ids: Vec<String>,
}

/// News read path plus the optimistic mutation reconciler for archive and
/// like toggles.
///
/// Every mutation follows the same sequence: snapshot the current state,
/// apply the flip locally, write through to the snapshot cache, call the
/// server, then either merge the server's authoritative object back (its
/// counts always win over the local guess) or restore the exact
/// pre-mutation snapshot.
pub struct NewsService {
    api: Arc<dyn NewsApi>,
    cache: Arc<SnapshotCache>,
    bookmarks: Arc<BookmarkMetadataStore>,
    preferences: RequestCache<UserPreferences>,
    state: RwLock<NewsState>,
    in_flight: Arc<StdMutex<HashSet<String>>>,
}

impl NewsService {
    pub fn new(
        api: Arc<dyn NewsApi>,
        cache: Arc<SnapshotCache>,
        bookmarks: Arc<BookmarkMetadataStore>,
        preferences: RequestCache<UserPreferences>,
    ) -> Self {
        Self {
            api,
            cache,
            bookmarks,
            preferences,
            state: RwLock::new(NewsState::default()),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    pub async fn current_state(&self) -> NewsState {
        self.state.read().await.clone()
    }

    /// Fast path: serve the fresh snapshot when one exists, otherwise fetch
    /// from the network and persist the result.
    pub async fn get_news(&self, query: NewsQuery) -> Result<Vec<NewsRecord>> {
        if let Some(snapshot) = self.cache.get_snapshot().await {
            debug!("serving {} articles from snapshot cache", snapshot.news.len());
            let mut state = self.state.write().await;
            state.news = snapshot.news.clone();
            state.archived_ids = snapshot.archived_ids;
            return Ok(snapshot.news);
        }
        self.fetch_and_store(query).await
    }

    /// Manual refresh pull: drop the cached snapshot first, then refetch.
    pub async fn refresh(&self, query: NewsQuery) -> Result<Vec<NewsRecord>> {
        if let Err(err) = self.cache.clear().await {
            warn!("cache clear before refresh failed: {err}");
        }
        self.fetch_and_store(query).await
    }

    async fn fetch_and_store(&self, query: NewsQuery) -> Result<Vec<NewsRecord>> {
        let news = self.api.fetch_news(query).await?;
        let archived_ids = self.state.read().await.archived_ids.clone();
        self.cache.set_snapshot(&news, &archived_ids).await?;

        let mut state = self.state.write().await;
        state.news = news.clone();
        Ok(news)
    }

    /// Optimistically flips the archive state of one article. Returns the
    /// reconciled archived id set on success; on failure the exact
    /// pre-mutation state is restored to memory and cache before the error
    /// surfaces.
    pub async fn toggle_archive(&self, news_id: &str) -> Result<Vec<String>> {
        let _guard = self.claim(news_id)?;
        let mutation_id = Uuid::new_v4();
        debug!("archive toggle {mutation_id} for {news_id}");
        let prior = self.current_state().await;

        // Local flip first: this is what makes the interaction feel instant.
        let optimistic = {
            let mut state = self.state.write().await;
            if state.archived_ids.iter().any(|id| id == news_id) {
                state.archived_ids.retain(|id| id != news_id);
            } else {
                state.archived_ids.push(news_id.to_string());
            }
            state.clone()
        };

        // Write-through before the network call; the rollback contract
        // depends on the persisted snapshot matching the optimistic state.
        if let Err(err) = self
            .cache
            .set_snapshot(&optimistic.news, &optimistic.archived_ids)
            .await
        {
            self.restore(prior).await;
            return Err(err);
        }

        match self.api.toggle_archive(news_id).await {
            Ok(outcome) => {
                let reconciled = {
                    let mut state = self.state.write().await;
                    state.archived_ids = outcome.archived_news_ids;
                    if let Some(item) = outcome.news_item {
                        merge_record(&mut state.news, item);
                    }
                    state.clone()
                };
                // The server already applied the mutation: a failed
                // re-persist must not surface as a mutation failure. The
                // TTL refetch repairs the snapshot.
                if let Err(err) = self
                    .cache
                    .set_snapshot(&reconciled.news, &reconciled.archived_ids)
                    .await
                {
                    warn!("post-confirmation snapshot write failed: {err}");
                }

                // Best-effort dual write; drift is re-derived at the next
                // confirmed mutation.
                if let Err(err) = self.bookmarks.reconcile(&reconciled.archived_ids).await {
                    warn!("bookmark metadata reconcile failed: {err}");
                }
                Ok(reconciled.archived_ids)
            }
            Err(err) => {
                error!("archive toggle {mutation_id} for {news_id} failed, rolling back: {err}");
                self.restore(prior).await;
                Err(err)
            }
        }
    }

    /// Optimistically flips the user's like on one article. The server's
    /// returned record replaces the local guess wholesale: concurrent likes
    /// from other users make the local ±1 a placeholder only.
    pub async fn toggle_like(&self, news_id: &str, user_id: &str) -> Result<NewsRecord> {
        let _guard = self.claim(news_id)?;
        let mutation_id = Uuid::new_v4();
        debug!("like toggle {mutation_id} for {news_id} by {user_id}");
        let prior = self.current_state().await;

        let optimistic = {
            let mut state = self.state.write().await;
            let Some(record) = state.news.iter_mut().find(|record| record.id == news_id)
            else {
                return Err(AppError::NotFound(format!("news {news_id}")));
            };
            record.toggle_like(user_id);
            state.clone()
        };

        if let Err(err) = self
            .cache
            .set_snapshot(&optimistic.news, &optimistic.archived_ids)
            .await
        {
            self.restore(prior).await;
            return Err(err);
        }

        match self.api.like(news_id).await {
            Ok(server_record) => {
                let reconciled = {
                    let mut state = self.state.write().await;
                    merge_record(&mut state.news, server_record.clone());
                    state.clone()
                };
                if let Err(err) = self
                    .cache
                    .set_snapshot(&reconciled.news, &reconciled.archived_ids)
                    .await
                {
                    warn!("post-confirmation snapshot write failed: {err}");
                }
                Ok(server_record)
            }
            Err(err) => {
                error!("like toggle {mutation_id} for {news_id} failed, rolling back: {err}");
                self.restore(prior).await;
                Err(err)
            }
        }
    }

    /// Preference fetches are memoized through the request cache to
    /// collapse duplicate polls inside the TTL window.
    pub async fn user_preferences(&self, user_id: &str) -> Result<UserPreferences> {
        if let Some(prefs) = self.preferences.get(user_id).await {
            return Ok(prefs);
        }
        let prefs = self.api.fetch_user_preferences(user_id).await?;
        self.preferences.set(user_id, prefs.clone()).await;
        Ok(prefs)
    }

    /// Drops cached snapshot, session keys, memoized requests, and the
    /// in-memory projection.
    pub async fn logout(&self) -> Result<()> {
        self.cache.clear().await?;
        self.preferences.clear(None).await;
        let mut state = self.state.write().await;
        *state = NewsState::default();
        Ok(())
    }

    /// Rejects a second mutation for an id whose first mutation has not
    /// resolved, instead of letting the two interleave.
    fn claim(&self, news_id: &str) -> Result<InFlightGuard> {
        let mut in_flight = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !in_flight.insert(news_id.to_string()) {
            return Err(AppError::MutationInFlight(news_id.to_string()));
        }
        Ok(InFlightGuard {
            id: news_id.to_string(),
            set: Arc::clone(&self.in_flight),
        })
    }

    async fn restore(&self, prior: NewsState) {
        {
            let mut state = self.state.write().await;
            *state = prior.clone();
        }
        // Rollback must reach the cache too; if even that write fails the
        // snapshot will be refetched after the TTL anyway.
        if let Err(err) = self.cache.set_snapshot(&prior.news, &prior.archived_ids).await {
            error!("rollback cache write failed: {err}");
        }
    }
}

fn merge_record(news: &mut Vec<NewsRecord>, incoming: NewsRecord) {
    match news.iter_mut().find(|record| record.id == incoming.id) {
        Some(existing) => *existing = incoming,
        None => news.push(incoming),
    }
}

struct InFlightGuard {
    id: String,
    set: Arc<StdMutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}
