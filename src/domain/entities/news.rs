use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local mirror of one remote news article. Fields are only ever mutated as
/// an optimistic echo of a mutation already sent to the server, and are
/// overwritten wholesale by the server's response once it arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub image_url: Option<String>,
    /// Visibility role the article is published for.
    pub role: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u32,
    pub view_count: u32,
    pub liked_by: Vec<String>,
}

impl NewsRecord {
    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liked_by.iter().any(|id| id == user_id)
    }

    /// Flips the user's like membership and adjusts the count by one. The
    /// count saturates at zero and `liked_by` never gains a duplicate id.
    pub fn toggle_like(&mut self, user_id: &str) {
        if self.is_liked_by(user_id) {
            self.liked_by.retain(|id| id != user_id);
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.liked_by.push(user_id.to_string());
            self.like_count = self.like_count.saturating_add(1);
        }
    }
}

/// The persisted `(news, archived_ids, last_fetched_at)` triple.
///
/// `archived_ids` may reference ids that no longer appear in `news`, since
/// archived items can be filtered out of subsequent fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsSnapshot {
    pub news: Vec<NewsRecord>,
    pub archived_ids: Vec<String>,
    pub last_fetched_at: DateTime<Utc>,
}

impl NewsSnapshot {
    /// Half-open freshness window: elapsed >= ttl means expired.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        now - self.last_fetched_at >= ttl
    }
}
