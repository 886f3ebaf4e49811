pub mod bookmark_store;
pub mod file_store;
pub mod memory_store;

pub use bookmark_store::BookmarkMetadataStore;
pub use file_store::FileKeyValueStore;
pub use memory_store::InMemoryKeyValueStore;
