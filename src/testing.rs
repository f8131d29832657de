//! In-memory source fakes that count their calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};

use crate::cache::MemoryCache;
use crate::feed::{FeedEntry, FeedSource};
use crate::http::FetchError;
use crate::ingest::Ingestor;
use crate::storage::{Database, NewStory};
use crate::trending::TrendingSource;

pub fn story(source_id: i64, published_secs: i64) -> NewStory {
    NewStory {
        source_id,
        title: format!("Story {source_id}"),
        url: Some(format!("https://example.com/story/{source_id}")),
        text: None,
        author: "alice".to_string(),
        score: source_id * 10,
        published_at: DateTime::from_timestamp(published_secs, 0).unwrap_or_default(),
        descendants: 0,
        kind: "story".to_string(),
    }
}

pub fn entry(link: &str, published: Option<DateTime<Utc>>) -> FeedEntry {
    FeedEntry {
        title: Some(format!("Entry {link}")),
        link: Some(link.to_string()),
        summary: Some("summary".to_string()),
        content: None,
        published,
    }
}

#[derive(Default)]
pub struct FakeTrending {
    pub ranking: Mutex<Vec<i64>>,
    pub items: Mutex<HashMap<i64, NewStory>>,
    /// Identifiers whose detail call fails
    pub broken: Mutex<HashSet<i64>>,
    pub top_down: std::sync::atomic::AtomicBool,
    pub top_calls: AtomicUsize,
    pub item_calls: AtomicUsize,
}

impl FakeTrending {
    pub fn with_stories(stories: Vec<NewStory>) -> Self {
        let fake = Self::default();
        {
            let mut ranking = fake.ranking.lock().unwrap();
            let mut items = fake.items.lock().unwrap();
            for story in stories {
                ranking.push(story.source_id);
                items.insert(story.source_id, story);
            }
        }
        fake
    }

    pub fn top_calls(&self) -> usize {
        self.top_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }
}

impl TrendingSource for FakeTrending {
    fn top_ids(&self, limit: usize) -> BoxFuture<'_, Result<Vec<i64>, FetchError>> {
        self.top_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.top_down.load(Ordering::SeqCst) {
            Err(FetchError::HttpStatus(503))
        } else {
            Ok(self.ranking.lock().unwrap().iter().copied().take(limit).collect())
        };
        future::ready(result).boxed()
    }

    fn item(&self, id: i64) -> BoxFuture<'_, Result<Option<NewStory>, FetchError>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.broken.lock().unwrap().contains(&id) {
            Err(FetchError::Timeout)
        } else {
            Ok(self.items.lock().unwrap().get(&id).cloned())
        };
        future::ready(result).boxed()
    }
}

/// Serves entries per feed URL. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct FakeFeeds {
    pub entries: Mutex<HashMap<String, Vec<FeedEntry>>>,
    pub calls: AtomicUsize,
}

impl FakeFeeds {
    pub fn serve(&self, url: &str, entries: Vec<FeedEntry>) {
        self.entries.lock().unwrap().insert(url.to_string(), entries);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeedSource for FakeFeeds {
    fn fetch_entries<'a>(
        &'a self,
        feed_url: &'a str,
    ) -> BoxFuture<'a, Result<Vec<FeedEntry>, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .entries
            .lock()
            .unwrap()
            .get(feed_url)
            .cloned()
            .ok_or(FetchError::HttpStatus(404));
        future::ready(result).boxed()
    }
}

pub struct Harness {
    pub db: Database,
    pub cache: Arc<MemoryCache>,
    pub trending: Arc<FakeTrending>,
    pub feeds: Arc<FakeFeeds>,
    pub ingestor: Ingestor,
}

pub async fn harness(trending: FakeTrending) -> Harness {
    let db = Database::open(":memory:").await.unwrap();
    let cache = Arc::new(MemoryCache::new(std::num::NonZeroUsize::new(64).unwrap()));
    let trending = Arc::new(trending);
    let feeds = Arc::new(FakeFeeds::default());
    let ingestor = Ingestor::new(db.clone(), cache.clone(), trending.clone(), feeds.clone())
        .with_concurrency(4);
    Harness {
        db,
        cache,
        trending,
        feeds,
        ingestor,
    }
}
