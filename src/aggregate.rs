//! Combined view across the trending source and every feed subscription.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::cache::{get_json, set_json};
use crate::error::Result;
use crate::ingest::Ingestor;
use crate::storage::{FeedItem, Story};

const ALL_FEED_ITEMS_KEY: &str = "feeds:all-items";

pub const TRENDING_LABEL: &str = "Hacker News";
pub const FEED_FALLBACK_LABEL: &str = "RSS";

/// Discussion page for stories that carry no external link
pub fn discussion_url(source_id: i64) -> String {
    format!("https://news.ycombinator.com/item?id={source_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Trending,
    Feed,
}

/// One row of the combined view. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub score: i64,
    /// Published time, or creation time when the source gave none
    pub time: DateTime<Utc>,
    pub source: String,
}

impl MergedItem {
    pub fn from_story(story: Story) -> Self {
        Self {
            id: story.id,
            kind: ItemKind::Trending,
            url: story
                .url
                .unwrap_or_else(|| discussion_url(story.source_id)),
            title: story.title,
            description: story.text,
            author: Some(story.author),
            score: story.score,
            time: story.published_at,
            source: TRENDING_LABEL.to_string(),
        }
    }

    pub fn from_feed_item(item: FeedItem, feed_title: Option<&str>) -> Self {
        Self {
            id: item.id,
            kind: ItemKind::Feed,
            time: item.effective_time(),
            title: item.title,
            url: item.link,
            description: item.description,
            author: None,
            score: 0,
            source: feed_title.unwrap_or(FEED_FALLBACK_LABEL).to_string(),
        }
    }
}

/// Concatenate, order newest first, and cut to `limit`.
///
/// The sort is stable, so equal timestamps keep trending-before-feed and
/// each input's own order.
pub fn merge(trending: Vec<MergedItem>, feed: Vec<MergedItem>, limit: usize) -> Vec<MergedItem> {
    let mut combined: Vec<MergedItem> = trending.into_iter().chain(feed).collect();
    combined.sort_by(|a, b| b.time.cmp(&a.time));
    combined.truncate(limit);
    combined
}

#[derive(Clone)]
pub struct Aggregator {
    ingestor: Ingestor,
}

impl Aggregator {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }

    /// Refresh every subscription and flatten the results, feed by feed in
    /// subscription order. Cached as a whole for the cache TTL.
    ///
    /// A feed that fails with a storage error is logged and left out.
    pub async fn fetch_all_feed_items(&self) -> Result<Vec<FeedItem>> {
        let cache = self.ingestor.cache();
        if let Some(items) = get_json::<Vec<FeedItem>>(cache, ALL_FEED_ITEMS_KEY) {
            tracing::debug!(items = items.len(), "Feed aggregate cache hit");
            return Ok(items);
        }

        let feeds = self.ingestor.db().list_feeds().await?;
        let feed_count = feeds.len();

        let per_feed: Vec<Vec<FeedItem>> = stream::iter(feeds)
            .map(|feed| async move {
                match self.ingestor.fetch_feed(feed.id).await {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!(feed_id = feed.id, error = %e, "Skipping feed in aggregate");
                        Vec::new()
                    }
                }
            })
            .buffered(self.ingestor.concurrency())
            .collect()
            .await;

        let items: Vec<FeedItem> = per_feed.into_iter().flatten().collect();
        set_json(cache, ALL_FEED_ITEMS_KEY, &items, self.ingestor.cache_ttl());

        tracing::info!(feeds = feed_count, items = items.len(), "Feed aggregate rebuilt");
        Ok(items)
    }

    /// Mixed trending/feed view, newest first, at most `limit` long.
    ///
    /// Each side contributes at most `limit / 2` rows. The feed side is the
    /// head of [`Self::fetch_all_feed_items`] as-is, so a feed listed early
    /// can crowd out newer items from later feeds.
    pub async fn combine(&self, limit: usize) -> Result<Vec<MergedItem>> {
        let half = limit / 2;

        let stories = self.ingestor.fetch_trending(half).await?;
        let feed_items = self.fetch_all_feed_items().await?;

        let titles: HashMap<i64, String> = self
            .ingestor
            .db()
            .list_feeds()
            .await?
            .into_iter()
            .map(|f| (f.id, f.title))
            .collect();

        let trending = stories.into_iter().map(MergedItem::from_story).collect();
        let feed = feed_items
            .into_iter()
            .take(half)
            .map(|item| {
                let title = titles.get(&item.feed_id).map(String::as_str);
                MergedItem::from_feed_item(item, title)
            })
            .collect();

        Ok(merge(trending, feed, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewFeed;
    use crate::testing::{entry, harness, story, FakeTrending};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn item(id: i64, kind: ItemKind, secs: i64) -> MergedItem {
        MergedItem {
            id,
            kind,
            title: format!("item {id}"),
            url: format!("https://example.com/{id}"),
            description: None,
            author: None,
            score: 0,
            time: DateTime::from_timestamp(secs, 0).unwrap(),
            source: "test".to_string(),
        }
    }

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    async fn subscribe(db: &crate::storage::Database, title: &str, feed_url: &str) -> i64 {
        db.insert_feed(&NewFeed {
            title: title.to_string(),
            url: String::new(),
            feed_url: feed_url.to_string(),
            description: None,
        })
        .await
        .unwrap()
        .id
    }

    #[test]
    fn test_merge_ties_keep_insertion_order() {
        let merged = merge(
            vec![item(1, ItemKind::Trending, 10)],
            vec![item(2, ItemKind::Feed, 10), item(3, ItemKind::Feed, 20)],
            10,
        );
        let ids: Vec<i64> = merged.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_story_without_url_links_to_discussion() {
        let stored = Story {
            id: 1,
            source_id: 8863,
            title: "Ask HN".to_string(),
            url: None,
            text: Some("body".to_string()),
            author: "dhouston".to_string(),
            score: 111,
            published_at: DateTime::from_timestamp(1_175_714_200, 0).unwrap(),
            descendants: 71,
            kind: "story".to_string(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let merged = MergedItem::from_story(stored);
        assert_eq!(merged.url, "https://news.ycombinator.com/item?id=8863");
        assert_eq!(merged.source, "Hacker News");
        assert_eq!(merged.score, 111);
        assert_eq!(merged.author.as_deref(), Some("dhouston"));
    }

    #[test]
    fn test_merged_item_json_shape() {
        let json = serde_json::to_value(item(5, ItemKind::Feed, 0)).unwrap();
        assert_eq!(json["type"], "feed");
        assert_eq!(json["time"], "1970-01-01T00:00:00Z");
    }

    proptest! {
        #[test]
        fn merge_is_newest_first_and_bounded(
            trending in proptest::collection::vec(0i64..1_000_000, 0..40),
            feed in proptest::collection::vec(0i64..1_000_000, 0..40),
            limit in 0usize..60,
        ) {
            let trending: Vec<_> = trending
                .into_iter()
                .enumerate()
                .map(|(i, t)| item(i as i64, ItemKind::Trending, t))
                .collect();
            let feed: Vec<_> = feed
                .into_iter()
                .enumerate()
                .map(|(i, t)| item(1000 + i as i64, ItemKind::Feed, t))
                .collect();
            let total = trending.len() + feed.len();

            let merged = merge(trending, feed, limit);

            prop_assert_eq!(merged.len(), total.min(limit));
            prop_assert!(merged.windows(2).all(|w| w[0].time >= w[1].time));
        }
    }

    #[tokio::test]
    async fn test_combine_splits_limit_between_sources() {
        let h = harness(FakeTrending::with_stories(vec![
            story(1, 500),
            story(2, 300),
            story(3, 100),
        ]))
        .await;
        let feed_id = subscribe(&h.db, "Example", "https://example.com/feed").await;
        h.feeds.serve(
            "https://example.com/feed",
            vec![
                entry("https://example.com/a", at(400)),
                entry("https://example.com/b", at(200)),
                entry("https://example.com/c", at(600)),
            ],
        );
        let aggregator = Aggregator::new(h.ingestor.clone());

        let merged = aggregator.combine(4).await.unwrap();

        let summary: Vec<(ItemKind, i64)> =
            merged.iter().map(|m| (m.kind, m.time.timestamp())).collect();
        assert_eq!(
            summary,
            vec![
                (ItemKind::Trending, 500),
                (ItemKind::Feed, 400),
                (ItemKind::Trending, 300),
                (ItemKind::Feed, 200),
            ],
            "the newest feed entry sits third in the feed and is not reached"
        );
        assert!(merged
            .iter()
            .filter(|m| m.kind == ItemKind::Feed)
            .all(|m| m.source == "Example"));
        assert_eq!(h.db.count_feed_items(feed_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_combine_odd_and_tiny_limits() {
        let h = harness(FakeTrending::with_stories(vec![story(1, 1)])).await;
        let aggregator = Aggregator::new(h.ingestor.clone());

        assert!(aggregator.combine(1).await.unwrap().is_empty());
        assert_eq!(h.trending.top_calls(), 0);

        let merged = aggregator.combine(3).await.unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_aggregate_cached_and_isolated() {
        let h = harness(FakeTrending::default()).await;
        subscribe(&h.db, "Up", "https://up.example.com/feed").await;
        subscribe(&h.db, "Down", "https://down.example.com/feed").await;
        subscribe(&h.db, "Also up", "https://also.example.com/feed").await;
        h.feeds.serve(
            "https://up.example.com/feed",
            vec![entry("https://up.example.com/1", at(1))],
        );
        h.feeds.serve(
            "https://also.example.com/feed",
            vec![
                entry("https://also.example.com/1", at(2)),
                entry("https://also.example.com/2", at(3)),
            ],
        );
        let aggregator = Aggregator::new(h.ingestor.clone());

        let first = aggregator.fetch_all_feed_items().await.unwrap();
        let links: Vec<&str> = first.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://up.example.com/1",
                "https://also.example.com/1",
                "https://also.example.com/2"
            ]
        );
        assert_eq!(h.feeds.calls(), 3);

        let second = aggregator.fetch_all_feed_items().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.feeds.calls(), 3, "second call must come from the cache");
    }

    #[tokio::test]
    async fn test_deleted_feed_labelled_generically() {
        let h = harness(FakeTrending::default()).await;
        let feed_id = subscribe(&h.db, "Gone soon", "https://gone.example.com/feed").await;
        h.feeds.serve(
            "https://gone.example.com/feed",
            vec![entry("https://gone.example.com/1", at(5))],
        );
        let aggregator = Aggregator::new(h.ingestor.clone());

        // Warm the aggregate, then drop the subscription behind the cache
        aggregator.fetch_all_feed_items().await.unwrap();
        h.db.delete_feed(feed_id).await.unwrap();

        let merged = aggregator.combine(10).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, "RSS");
    }
}
