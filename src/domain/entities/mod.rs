pub mod bookmark;
pub mod image;
pub mod news;

pub use bookmark::BookmarkMetadata;
pub use image::{CacheStats, ImageCacheEntry};
pub use news::{NewsRecord, NewsSnapshot};
