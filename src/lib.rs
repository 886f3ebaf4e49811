//! Offline cache and optimistic sync core for the Newsstand news reader.
//!
//! The crate owns the device-local snapshot of remote news data and the
//! reconciliation of user actions performed before server confirmation:
//! a TTL-bound news snapshot cache, a short-TTL request memoization map,
//! a size-capped LRU image byte cache, a memory pressure manager, and the
//! optimistic mutation reconciler used by archive and like toggles.
//! Screens, navigation, and the remote API itself live in the host app;
//! this crate consumes them through ports.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::ports::{
    keys, AppLifecycleSource, AppPhase, ChannelLifecycleSource, Clock, ImagePrefetcher,
    KeyValueStore, ManualClock, MemoryProbe, NewsApi, NewsQuery, NoopMemoryProbe, NoopPrefetcher,
    SystemClock, ToggleArchiveOutcome, UserPreferences,
};
pub use application::services::{MemoryManager, NewsService, NewsState, WarningSubscription};
pub use domain::entities::{BookmarkMetadata, CacheStats, ImageCacheEntry, NewsRecord, NewsSnapshot};
pub use infrastructure::cache::{ImageCacheService, RequestCache, SnapshotCache};
pub use infrastructure::storage::{
    BookmarkMetadataStore, FileKeyValueStore, InMemoryKeyValueStore,
};
pub use shared::config::AppConfig;
pub use shared::error::{AppError, Result};
pub use state::AppState;

/// Installs a fmt subscriber honoring `RUST_LOG`. For hosts and examples
/// that do not bring their own subscriber.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsstand_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
