use crate::application::ports::clock::{Clock, SystemClock};
use crate::application::ports::image_prefetcher::ImagePrefetcher;
use crate::application::ports::key_value_store::KeyValueStore;
use crate::application::ports::lifecycle::{AppLifecycleSource, MemoryProbe};
use crate::application::ports::news_api::NewsApi;
use crate::application::services::memory_service::MemoryManager;
use crate::application::services::news_service::NewsService;
use crate::infrastructure::cache::image_cache::ImageCacheService;
use crate::infrastructure::cache::request_cache::RequestCache;
use crate::infrastructure::cache::snapshot_cache::SnapshotCache;
use crate::infrastructure::storage::bookmark_store::BookmarkMetadataStore;
use crate::shared::config::AppConfig;
use std::sync::Arc;

/// Composition root. The host injects its platform ports (store, remote
/// API, prefetcher, memory probe); everything else is wired here, with
/// explicit start/stop instead of constructor-started timers.
pub struct AppState {
    pub news_service: Arc<NewsService>,
    pub image_cache: Arc<ImageCacheService>,
    pub memory_manager: Arc<MemoryManager>,
    pub snapshot_cache: Arc<SnapshotCache>,
    pub bookmarks: Arc<BookmarkMetadataStore>,
}

impl AppState {
    pub async fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn NewsApi>,
        prefetcher: Arc<dyn ImagePrefetcher>,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let snapshot_cache = Arc::new(SnapshotCache::new(
            store.clone(),
            clock.clone(),
            config.snapshot.ttl(),
        ));
        let bookmarks = Arc::new(BookmarkMetadataStore::new(store.clone(), clock.clone()));
        let preferences = RequestCache::new(clock.clone(), config.request.ttl());
        let image_cache = Arc::new(
            ImageCacheService::load(
                store.clone(),
                prefetcher,
                clock.clone(),
                config.image.clone(),
            )
            .await,
        );

        let news_service = Arc::new(NewsService::new(
            api,
            snapshot_cache.clone(),
            bookmarks.clone(),
            preferences,
        ));
        let memory_manager = Arc::new(MemoryManager::new(
            store,
            image_cache.clone(),
            probe,
            config.memory.clone(),
        ));

        Self {
            news_service,
            image_cache,
            memory_manager,
            snapshot_cache,
            bookmarks,
        }
    }

    /// Starts the background cleanup task against the host's lifecycle feed.
    pub fn start(&self, lifecycle: &dyn AppLifecycleSource) {
        self.memory_manager.start(lifecycle);
    }

    pub fn shutdown(&self) {
        self.memory_manager.stop();
    }
}
