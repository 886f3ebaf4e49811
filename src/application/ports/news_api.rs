use crate::domain::entities::NewsRecord;
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsQuery {
    pub role: String,
    pub category: Option<String>,
    pub query: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl NewsQuery {
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }
}

/// Server response to an archive toggle: the authoritative archived id set,
/// plus the touched article when the server returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleArchiveOutcome {
    pub archived_news_ids: Vec<String>,
    pub news_item: Option<NewsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub archived_news_ids: Vec<String>,
    pub selected_categories: Vec<String>,
}

/// Remote REST backend, consumed as a black box. The wire format is not
/// owned here; this crate only defines what it does with the results.
#[async_trait]
pub trait NewsApi: Send + Sync {
    async fn fetch_news(&self, query: NewsQuery) -> Result<Vec<NewsRecord>>;
    async fn toggle_archive(&self, news_id: &str) -> Result<ToggleArchiveOutcome>;
    async fn like(&self, news_id: &str) -> Result<NewsRecord>;
    async fn fetch_user_preferences(&self, user_id: &str) -> Result<UserPreferences>;
}
