pub mod memory_service;
pub mod news_service;

pub use memory_service::{MemoryManager, WarningSubscription};
pub use news_service::{NewsService, NewsState};
