//! Hacker News ranking API adapter.

use chrono::DateTime;
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;

use crate::http::{fetch_bytes, FetchError, RetryPolicy};
use crate::storage::NewStory;

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Item kind accepted as a story; jobs, polls and comments are dropped.
const STORY_KIND: &str = "story";

/// Source of ranked story identifiers and their details.
pub trait TrendingSource: Send + Sync {
    /// Current ranking, truncated to `limit` identifiers.
    fn top_ids(&self, limit: usize) -> BoxFuture<'_, Result<Vec<i64>, FetchError>>;

    /// Detail for one identifier. `None` when the item is gone, deleted, or
    /// not a story.
    fn item(&self, id: i64) -> BoxFuture<'_, Result<Option<NewStory>, FetchError>>;
}

/// Firebase item payload. Every field may be missing.
#[derive(Debug, Deserialize)]
struct HnItem {
    id: i64,
    #[serde(default)]
    deleted: bool,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    text: Option<String>,
    by: Option<String>,
    score: Option<i64>,
    time: Option<i64>,
    descendants: Option<i64>,
}

impl HnItem {
    fn into_story(self) -> Option<NewStory> {
        if self.deleted || self.kind.as_deref() != Some(STORY_KIND) {
            return None;
        }
        Some(NewStory {
            source_id: self.id,
            title: self.title.unwrap_or_default(),
            url: self.url.filter(|u| !u.is_empty()),
            text: self.text,
            author: self.by.unwrap_or_else(|| "unknown".to_string()),
            score: self.score.unwrap_or(0),
            published_at: DateTime::from_timestamp(self.time.unwrap_or(0), 0).unwrap_or_default(),
            descendants: self.descendants.unwrap_or(0),
            kind: STORY_KIND.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct HackerNewsClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HackerNewsClient {
    pub fn new(client: reqwest::Client, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    async fn fetch_top_ids(&self, limit: usize) -> Result<Vec<i64>, FetchError> {
        let url = format!("{}/topstories.json", self.base_url);
        let bytes = fetch_bytes(&self.client, &url, &self.policy).await?;
        let mut ids: Vec<i64> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        ids.truncate(limit);
        Ok(ids)
    }

    async fn fetch_item(&self, id: i64) -> Result<Option<NewStory>, FetchError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let bytes = fetch_bytes(&self.client, &url, &self.policy).await?;
        // The API answers `null` for identifiers it does not know
        let item: Option<HnItem> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(item.and_then(HnItem::into_story))
    }
}

impl TrendingSource for HackerNewsClient {
    fn top_ids(&self, limit: usize) -> BoxFuture<'_, Result<Vec<i64>, FetchError>> {
        self.fetch_top_ids(limit).boxed()
    }

    fn item(&self, id: i64) -> BoxFuture<'_, Result<Option<NewStory>, FetchError>> {
        self.fetch_item(id).boxed()
    }
}
