use crate::error::{Error, Result};
use crate::feed::FeedEntry;
use crate::storage::{FeedItem, NewFeedItem};

use super::Ingestor;

/// Entries considered per refresh, taken from the top of the document.
pub const MAX_ENTRIES_PER_REFRESH: usize = 30;

const UNTITLED: &str = "Untitled";

impl Ingestor {
    /// Refresh one subscription and return its current items.
    ///
    /// Returns existing records unchanged and stores new ones, in the order
    /// the source lists them. An unknown `feed_id` yields an empty list. An
    /// unreachable or unparseable feed also yields an empty list; the
    /// subscription's `last_fetched` is bumped either way.
    pub async fn fetch_feed(&self, feed_id: i64) -> Result<Vec<FeedItem>> {
        let Some(feed) = self.db.get_feed(feed_id).await? else {
            tracing::debug!(feed_id, "Refresh requested for unknown feed");
            return Ok(Vec::new());
        };

        let entries = match self.feeds.fetch_entries(&feed.feed_url).await {
            Ok(entries) => entries,
            Err(e) => {
                let err = Error::from(e);
                tracing::warn!(
                    feed_id,
                    feed_url = %feed.feed_url,
                    error = %err,
                    "Feed refresh failed, treating as empty"
                );
                Vec::new()
            }
        };

        let mut items = Vec::with_capacity(entries.len().min(MAX_ENTRIES_PER_REFRESH));
        let mut created = 0usize;

        for entry in entries.into_iter().take(MAX_ENTRIES_PER_REFRESH) {
            let Some(new_item) = normalize_entry(entry) else {
                tracing::debug!(feed_id, "Skipping entry without a link");
                continue;
            };

            if let Some(existing) = self.db.find_feed_item(feed_id, &new_item.link).await? {
                items.push(existing);
                continue;
            }

            items.push(self.db.insert_feed_item(feed_id, &new_item).await?);
            created += 1;
        }

        self.db.touch_feed_fetched(feed_id).await?;

        tracing::info!(feed_id, items = items.len(), created, "Feed refreshed");
        Ok(items)
    }
}

/// `None` when the entry has no link and so no dedup key.
fn normalize_entry(entry: FeedEntry) -> Option<NewFeedItem> {
    let link = entry.link?;

    let title = entry
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let description = entry.summary.or(entry.content).unwrap_or_default();

    Some(NewFeedItem {
        title,
        link,
        description: Some(description),
        published_at: entry.published,
    })
}
