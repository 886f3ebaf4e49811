use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-bookmark metadata persisted alongside (but not transactionally with)
/// the archived id set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookmarkMetadata {
    pub news_id: String,
    pub bookmarked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BookmarkMetadata {
    pub fn new(news_id: impl Into<String>, bookmarked_at: DateTime<Utc>) -> Self {
        Self {
            news_id: news_id.into(),
            bookmarked_at,
            tags: None,
            notes: None,
        }
    }
}
