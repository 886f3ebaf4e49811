use async_trait::async_trait;

/// Platform image decoder/cache warm-up. Fire-and-forget: no result is
/// consumed, failures are the implementation's problem to log.
#[async_trait]
pub trait ImagePrefetcher: Send + Sync {
    async fn prefetch(&self, url: &str);
}

/// Prefetcher that does nothing. For tests and headless hosts.
pub struct NoopPrefetcher;

#[async_trait]
impl ImagePrefetcher for NoopPrefetcher {
    async fn prefetch(&self, _url: &str) {}
}
