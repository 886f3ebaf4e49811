use crate::application::ports::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct RequestEntry<T> {
    data: T,
    stored_at: DateTime<Utc>,
}

/// Short-TTL in-process memoization map used to collapse identical request
/// bursts (repeated notification polls, preference fetches). Never
/// persisted; entries expire lazily on the next `get`.
pub struct RequestCache<T: Clone> {
    entries: Arc<RwLock<HashMap<String, RequestEntry<T>>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<T> RequestCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
            ttl,
        }
    }

    /// Returns the cached value while fresh. An entry found expired is
    /// evicted before `None` is returned.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);

        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if now - entry.stored_at < ttl => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Unconditional overwrite.
    pub async fn set(&self, key: impl Into<String>, data: T) {
        let entry = RequestEntry {
            data,
            stored_at: self.clock.now(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), entry);
    }

    /// Removes one entry, or every entry when no key is given.
    pub async fn clear(&self, key: Option<&str>) {
        let mut entries = self.entries.write().await;
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
