use crate::application::ports::key_value_store::KeyValueStore;
use crate::application::ports::lifecycle::{AppLifecycleSource, AppPhase, MemoryProbe};
use crate::infrastructure::cache::image_cache::ImageCacheService;
use crate::shared::config::MemoryConfig;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

type WarningCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by `on_memory_warning`. Dropping it keeps the callback
/// registered; call `unsubscribe` to remove it.
pub struct WarningSubscription {
    id: u64,
    callbacks: Arc<Mutex<HashMap<u64, WarningCallback>>>,
}

impl WarningSubscription {
    pub fn unsubscribe(self) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.remove(&self.id);
        }
    }
}

/// Cleanup orchestrator keeping resident cache size bounded. Explicitly
/// constructed and started; owns one background task that reacts to a fixed
/// interval and to app lifecycle transitions.
///
/// Only one cleanup of any kind runs at a time; a trigger arriving while one
/// is in progress is silently dropped, never queued.
pub struct MemoryManager {
    store: Arc<dyn KeyValueStore>,
    image_cache: Arc<ImageCacheService>,
    probe: Arc<dyn MemoryProbe>,
    config: MemoryConfig,
    is_cleaning_up: AtomicBool,
    cleanup_runs: AtomicU64,
    callbacks: Arc<Mutex<HashMap<u64, WarningCallback>>>,
    next_callback_id: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        image_cache: Arc<ImageCacheService>,
        probe: Arc<dyn MemoryProbe>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            image_cache,
            probe,
            config,
            is_cleaning_up: AtomicBool::new(false),
            cleanup_runs: AtomicU64::new(0),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            next_callback_id: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    /// Spawns the background task: routine cleanup on the configured
    /// interval, background cleanup when the app leaves the foreground,
    /// emergency cleanup when it returns under measured memory pressure.
    pub fn start(self: &Arc<Self>, lifecycle: &dyn AppLifecycleSource) {
        let manager = Arc::clone(self);
        let mut phases = lifecycle.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(manager.config.cleanup_interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut sweeper = tokio::time::interval(manager.image_cache.sweep_interval());
            sweeper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of each interval resolves immediately; swallow it.
            ticker.tick().await;
            sweeper.tick().await;

            let mut lifecycle_open = true;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.routine_cleanup().await;
                    }
                    _ = sweeper.tick() => {
                        let swept = manager.image_cache.cleanup().await;
                        debug!("scheduled image sweep removed {swept} entries");
                    }
                    phase = phases.recv(), if lifecycle_open => match phase {
                        Ok(AppPhase::Background) => {
                            manager.background_cleanup().await;
                        }
                        Ok(AppPhase::Active) => {
                            let ratio = manager.probe.usage_ratio();
                            if ratio > manager.config.emergency_usage_ratio {
                                info!("memory usage ratio {ratio:.2}, running emergency cleanup");
                                manager.emergency_cleanup().await;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("lifecycle feed lagged, skipped {skipped} transitions");
                        }
                        Err(RecvError::Closed) => {
                            lifecycle_open = false;
                        }
                    },
                }
            }
        });

        if let Ok(mut task) = self.task.lock() {
            if let Some(previous) = task.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    /// Registers a callback invoked after every emergency cleanup, so
    /// UI-layer consumers can shed their own in-memory state.
    pub fn on_memory_warning(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> WarningSubscription {
        let id = self.next_callback_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.insert(id, Arc::new(callback));
        }
        WarningSubscription {
            id,
            callbacks: Arc::clone(&self.callbacks),
        }
    }

    /// Interval-driven pass: store pruning, image-cache age sweep, temp
    /// data hook. Best-effort throughout; never propagates an error to the
    /// trigger.
    pub async fn routine_cleanup(&self) {
        let Some(_guard) = self.begin_cleanup() else {
            return;
        };
        self.run_standard_passes().await;
    }

    /// Backgrounding pass: everything routine does, plus the storage
    /// compaction hook.
    pub async fn background_cleanup(&self) {
        let Some(_guard) = self.begin_cleanup() else {
            return;
        };
        self.run_standard_passes().await;
        self.compact_storage().await;
    }

    /// Strictly more aggressive: drops non-essential keys regardless of
    /// age, clears the image cache entirely, then notifies every warning
    /// callback. Runs to completion before returning control.
    pub async fn emergency_cleanup(&self) {
        {
            let Some(_guard) = self.begin_cleanup() else {
                return;
            };

            match self.store.get_all_keys().await {
                Ok(all_keys) => {
                    let victims: Vec<&str> = all_keys
                        .iter()
                        .filter(|key| is_non_essential(key))
                        .map(|key| key.as_str())
                        .collect();
                    if !victims.is_empty() {
                        if let Err(err) = self.store.multi_remove(&victims).await {
                            warn!("emergency key removal failed: {err}");
                        } else {
                            info!("emergency cleanup removed {} keys", victims.len());
                        }
                    }
                }
                Err(err) => warn!("emergency cleanup could not list keys: {err}"),
            }

            self.image_cache.clear_cache().await;
            self.force_gc();
        }

        self.notify_memory_warning();
    }

    /// Number of cleanup passes that actually ran (coalesced triggers do
    /// not count). Diagnostics and test observability.
    pub fn cleanup_runs(&self) -> u64 {
        self.cleanup_runs.load(Ordering::SeqCst)
    }

    fn begin_cleanup(&self) -> Option<CleanupGuard<'_>> {
        if self
            .is_cleaning_up
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("cleanup already in progress, coalescing trigger");
            return None;
        }
        self.cleanup_runs.fetch_add(1, Ordering::SeqCst);
        Some(CleanupGuard { manager: self })
    }

    async fn run_standard_passes(&self) {
        self.prune_store().await;
        let swept = self.image_cache.cleanup().await;
        if swept > 0 {
            debug!("cleanup swept {swept} aged image entries");
        }
        self.clean_temp_data().await;
    }

    /// Drops the oldest fifth of tracked image entries once the store's
    /// total payload passes the configured threshold.
    async fn prune_store(&self) {
        let total = match self.tracked_store_bytes().await {
            Ok(total) => total,
            Err(err) => {
                warn!("store size measurement failed: {err}");
                return;
            }
        };
        if total <= self.config.store_size_threshold_bytes {
            return;
        }

        let pruned = self.image_cache.prune_oldest(self.config.prune_ratio).await;
        info!(
            "store at {total} bytes exceeded threshold, pruned {pruned} oldest entries"
        );
    }

    async fn tracked_store_bytes(&self) -> crate::shared::error::Result<u64> {
        let all_keys = self.store.get_all_keys().await?;
        let refs: Vec<&str> = all_keys.iter().map(|key| key.as_str()).collect();
        let pairs = self.store.multi_get(&refs).await?;
        Ok(pairs
            .iter()
            .filter_map(|(_, value)| value.as_ref())
            .map(|value| value.len() as u64)
            .sum())
    }

    // Extension hook: platform glue can override temp-file handling later.
    async fn clean_temp_data(&self) {
        trace!("temp data hook (no-op)");
    }

    // Extension hook: platform-specific store compaction.
    async fn compact_storage(&self) {
        trace!("storage compaction hook (no-op)");
    }

    fn force_gc(&self) {
        // No collector to poke in this runtime.
        trace!("forced GC hook (no-op)");
    }

    fn notify_memory_warning(&self) {
        // Clone the list out of the lock: a callback may register or
        // unsubscribe reentrantly.
        let callbacks: Vec<(u64, WarningCallback)> = {
            let guard = match self.callbacks.lock() {
                Ok(callbacks) => callbacks,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard
                .iter()
                .map(|(id, callback)| (*id, Arc::clone(callback)))
                .collect()
        };
        for (id, callback) in callbacks {
            // One panicking callback must not starve the rest.
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("memory warning callback {id} panicked");
            }
        }
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CleanupGuard<'a> {
    manager: &'a MemoryManager,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.manager.is_cleaning_up.store(false, Ordering::SeqCst);
    }
}

fn is_non_essential(key: &str) -> bool {
    key.contains("cache_") || key.contains("temp_") || key.contains("_old")
}
