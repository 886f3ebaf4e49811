pub mod clock;
pub mod image_prefetcher;
pub mod key_value_store;
pub mod lifecycle;
pub mod news_api;

pub use clock::{Clock, ManualClock, SystemClock};
pub use image_prefetcher::{ImagePrefetcher, NoopPrefetcher};
pub use key_value_store::{keys, KeyValueStore};
pub use lifecycle::{
    AppLifecycleSource, AppPhase, ChannelLifecycleSource, MemoryProbe, NoopMemoryProbe,
};
pub use news_api::{NewsApi, NewsQuery, ToggleArchiveOutcome, UserPreferences};
