use crate::shared::error::Result;
use async_trait::async_trait;

/// Well-known keys in the backing store. Each component owns the keys it
/// writes; correctness relies on that ownership plus last-write-wins.
pub mod keys {
    pub const NEWS_CACHE: &str = "news_cache";
    pub const LAST_FETCHED: &str = "last_fetched";
    pub const ARCHIVED_IDS: &str = "archived_news_ids";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const USER: &str = "user";
    pub const AUTH_TOKEN: &str = "authToken";
    pub const THEME_MODE: &str = "themeMode";
    pub const BOOKMARK_METADATA: &str = "bookmark_metadata";
    pub const IMAGE_METADATA: &str = "image_cache_metadata";
    pub const IMAGE_PREFIX: &str = "image_cache_";
}

/// Durable string-keyed storage primitive the cache layers read and write
/// through. Assumed crash-safe for committed writes, not transactional
/// across keys. All values are JSON strings serialized by the caller.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
    /// Batched read; returns one `(key, value)` pair per requested key.
    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>>;
    async fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()>;
    async fn multi_remove(&self, keys: &[&str]) -> Result<()>;
    async fn get_all_keys(&self) -> Result<Vec<String>>;
}
