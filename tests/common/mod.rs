use async_trait::async_trait;
use chrono::Utc;
use newsstand_core::shared::error::{AppError, Result};
use newsstand_core::{NewsApi, NewsQuery, NewsRecord, ToggleArchiveOutcome, UserPreferences};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

pub fn news_record(id: &str, like_count: u32) -> NewsRecord {
    NewsRecord {
        id: id.to_string(),
        title: format!("Title {id}"),
        content: format!("Body of {id}"),
        category: "general".to_string(),
        image_url: Some(format!("https://cdn.example.com/{id}.jpg")),
        role: "reader".to_string(),
        author_id: "author1".to_string(),
        created_at: Utc::now(),
        like_count,
        view_count: 0,
        liked_by: Vec::new(),
    }
}

/// Programmable remote backend for integration flows.
#[derive(Default)]
pub struct MockNewsApi {
    pub news: Mutex<Vec<NewsRecord>>,
    pub archived: Mutex<Vec<String>>,
    pub fetch_calls: AtomicUsize,
    pub fail_mutations: AtomicBool,
    pub like_response: Mutex<Option<NewsRecord>>,
}

#[async_trait]
impl NewsApi for MockNewsApi {
    async fn fetch_news(&self, _query: NewsQuery) -> Result<Vec<NewsRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.news.lock().await.clone())
    }

    async fn toggle_archive(&self, news_id: &str) -> Result<ToggleArchiveOutcome> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection reset".to_string()));
        }
        let mut archived = self.archived.lock().await;
        if archived.iter().any(|id| id == news_id) {
            archived.retain(|id| id != news_id);
        } else {
            archived.push(news_id.to_string());
        }
        Ok(ToggleArchiveOutcome {
            archived_news_ids: archived.clone(),
            news_item: None,
        })
    }

    async fn like(&self, news_id: &str) -> Result<NewsRecord> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection reset".to_string()));
        }
        match self.like_response.lock().await.clone() {
            Some(record) => Ok(record),
            None => Ok(news_record(news_id, 1)),
        }
    }

    async fn fetch_user_preferences(&self, _user_id: &str) -> Result<UserPreferences> {
        Ok(UserPreferences {
            archived_news_ids: self.archived.lock().await.clone(),
            selected_categories: vec!["general".to_string()],
        })
    }
}
