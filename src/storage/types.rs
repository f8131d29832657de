use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-level errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A unique index rejected the write (feed URL, story id, feed/link pair)
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// Rejected before reaching the database
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Convert an insert failure, turning unique-constraint violations into `Duplicate`.
    pub(crate) fn from_insert(err: sqlx::Error, key: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::Duplicate(key.to_owned())
            }
            _ => DatabaseError::Other(err),
        }
    }
}

/// Timestamps are stored as unix seconds. Out-of-range values collapse to the epoch.
pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

// ============================================================================
// Insert Payloads
// ============================================================================

/// A trending story as delivered by the upstream ranking API, not yet stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewStory {
    pub source_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub author: String,
    pub score: i64,
    pub published_at: DateTime<Utc>,
    pub descendants: i64,
    pub kind: String,
}

/// Subscription request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewFeed {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(alias = "feedUrl")]
    pub feed_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A normalized feed entry ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StoryRow {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub author: String,
    pub score: i64,
    pub published_at: i64,
    pub descendants: i64,
    pub kind: String,
    pub created_at: i64,
}

impl StoryRow {
    pub(crate) fn into_story(self) -> Story {
        Story {
            id: self.id,
            source_id: self.source_id,
            title: self.title,
            url: self.url,
            text: self.text,
            author: self.author,
            score: self.score,
            published_at: from_unix(self.published_at),
            descendants: self.descendants,
            kind: self.kind,
            created_at: from_unix(self.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub feed_url: String,
    pub description: Option<String>,
    pub folder_id: Option<i64>,
    pub created_at: i64,
    pub last_fetched: Option<i64>,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            title: self.title,
            url: self.url,
            feed_url: self.feed_url,
            description: self.description,
            folder_id: self.folder_id,
            created_at: from_unix(self.created_at),
            last_fetched: self.last_fetched.map(from_unix),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedItemRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

impl FeedItemRow {
    pub(crate) fn into_item(self) -> FeedItem {
        FeedItem {
            id: self.id,
            feed_id: self.feed_id,
            title: self.title,
            link: self.link,
            description: self.description,
            published_at: self.published_at.map(from_unix),
            created_at: from_unix(self.created_at),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A stored trending story. `source_id` is the upstream identifier and is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub author: String,
    pub score: i64,
    pub published_at: DateTime<Utc>,
    pub descendants: i64,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// A feed subscription. `feed_url` is the fetch target and is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub feed_url: String,
    pub description: Option<String>,
    pub folder_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub last_fetched: Option<DateTime<Utc>>,
}

/// A stored feed entry, keyed by `(feed_id, link)`.
///
/// Never updated after creation; removed only when its feed is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FeedItem {
    /// Published time, falling back to when the item was first stored
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}

/// Display grouping for feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
