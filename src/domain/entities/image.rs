use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one cached image blob. The base64 payload itself lives under
/// its own store key; only this bookkeeping is held in the metadata map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageCacheEntry {
    pub url: String,
    pub size_bytes: u64,
    pub cached_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total_bytes: u64,
    pub entry_count: usize,
    pub max_bytes: u64,
}
