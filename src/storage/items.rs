use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, FeedItem, FeedItemRow, NewFeedItem};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of items any single listing returns (OOM protection)
pub const MAX_ITEMS_PER_QUERY: i64 = 2000;

const ITEM_COLUMNS: &str = "id, feed_id, title, link, description, published_at, created_at";

impl Database {
    // ========================================================================
    // Feed Item Operations
    // ========================================================================

    /// Look up an item by its dedup key
    pub async fn find_feed_item(
        &self,
        feed_id: i64,
        link: &str,
    ) -> Result<Option<FeedItem>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM feed_items WHERE feed_id = ? AND link = ?"
        ))
        .bind(feed_id)
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedItemRow::into_item))
    }

    /// Insert an item, or return the existing row for the same `(feed_id, link)`.
    ///
    /// A concurrent refresh of the same feed may win the race between our
    /// lookup and this insert. The unique index resolves it: the losing insert
    /// is ignored and the stored row is returned unchanged.
    pub async fn insert_feed_item(
        &self,
        feed_id: i64,
        item: &NewFeedItem,
    ) -> Result<FeedItem, DatabaseError> {
        let now = Utc::now().timestamp();
        let inserted = sqlx::query_as::<_, FeedItemRow>(&format!(
            "INSERT INTO feed_items (feed_id, title, link, description, published_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(feed_id, link) DO NOTHING
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(feed_id)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.description)
        .bind(item.published_at.map(|t| t.timestamp()))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row.into_item());
        }

        tracing::debug!(feed_id, link = %item.link, "Item already stored by a concurrent refresh");
        self.find_feed_item(feed_id, &item.link)
            .await?
            .ok_or_else(|| DatabaseError::Duplicate(item.link.clone()))
    }

    /// Items of one feed, most recently published first (undated items last).
    ///
    /// At most [`MAX_ITEMS_PER_QUERY`] rows; older items beyond that are left out.
    pub async fn items_for_feed(&self, feed_id: i64) -> Result<Vec<FeedItem>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM feed_items
             WHERE feed_id = ?
             ORDER BY published_at IS NULL, published_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(feed_id)
        .bind(MAX_ITEMS_PER_QUERY)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedItemRow::into_item).collect())
    }

    /// Most recently published items across all feeds
    pub async fn latest_items(&self, limit: i64) -> Result<Vec<FeedItem>, DatabaseError> {
        let limit = limit.clamp(0, MAX_ITEMS_PER_QUERY);
        let rows = sqlx::query_as::<_, FeedItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM feed_items
             ORDER BY published_at IS NULL, published_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedItemRow::into_item).collect())
    }

    pub async fn count_feed_items(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feed_items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
