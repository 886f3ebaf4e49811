pub mod image_cache;
pub mod request_cache;
pub mod snapshot_cache;

pub use image_cache::ImageCacheService;
pub use request_cache::RequestCache;
pub use snapshot_cache::SnapshotCache;
