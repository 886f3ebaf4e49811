use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub snapshot: SnapshotCacheConfig,
    pub request: RequestCacheConfig,
    pub image: ImageCacheConfig,
    pub memory: MemoryConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCacheConfig {
    /// Seconds a fetched snapshot stays fresh before a forced refetch.
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCacheConfig {
    pub max_total_bytes: u64,
    pub max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub cleanup_interval_secs: u64,
    /// Total tracked store bytes beyond which the oldest entries are pruned.
    pub store_size_threshold_bytes: u64,
    /// Fraction of tracked entries removed by one pruning pass.
    pub prune_ratio: f64,
    /// Measured usage ratio above which foregrounding triggers emergency cleanup.
    pub emergency_usage_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl SnapshotCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl RequestCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl ImageCacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot: SnapshotCacheConfig::default(),
            request: RequestCacheConfig::default(),
            image: ImageCacheConfig::default(),
            memory: MemoryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for SnapshotCacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 } // 5 minutes; news staleness costs more than a refetch
    }
}

impl Default for RequestCacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: 50 * 1024 * 1024, // 50MB
            max_age_secs: 7 * 24 * 3600,       // 7 days
            sweep_interval_secs: 24 * 3600,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 300,
            store_size_threshold_bytes: 100 * 1024 * 1024, // 100MB
            prune_ratio: 0.2,
            emergency_usage_ratio: 0.8,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|dir| dir.join("newsstand"))
            .unwrap_or_else(|| PathBuf::from("./data"));
        Self { data_dir }
    }
}
