use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedRow, NewFeed};

const FEED_COLUMNS: &str =
    "id, title, url, feed_url, description, folder_id, created_at, last_fetched";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe to a feed.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Duplicate`] if `feed_url` is already subscribed.
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<Feed, DatabaseError> {
        let now = Utc::now().timestamp();
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "INSERT INTO feeds (title, url, feed_url, description, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(&feed.title)
        .bind(&feed.url)
        .bind(&feed.feed_url)
        .bind(&feed.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, &feed.feed_url))?;

        Ok(row.into_feed())
    }

    /// Subscribe unless the feed URL is already present.
    ///
    /// Returns `None` when the feed already existed. Used for seeding defaults,
    /// where an existing subscription is not an error.
    pub async fn insert_feed_if_absent(&self, feed: &NewFeed) -> Result<Option<Feed>, DatabaseError> {
        let now = Utc::now().timestamp();
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "INSERT INTO feeds (title, url, feed_url, description, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(feed_url) DO NOTHING
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(&feed.title)
        .bind(&feed.url)
        .bind(&feed.feed_url)
        .bind(&feed.description)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Whether a subscription with this fetch URL exists
    pub async fn feed_url_exists(&self, feed_url: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM feeds WHERE feed_url = ?")
            .bind(feed_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// All subscriptions in subscription order
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedRow::into_feed).collect())
    }

    /// Delete a feed and all of its items.
    ///
    /// Items are removed explicitly before the feed row (the FK cascade is a
    /// second line, not the mechanism). Returns `None` if the feed does not
    /// exist, otherwise the number of items removed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<Option<u64>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query("DELETE FROM feed_items WHERE feed_id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let feeds = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if feeds == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(items))
    }

    /// Update the last_fetched timestamp for a feed
    pub async fn touch_feed_fetched(&self, feed_id: i64) -> Result<(), DatabaseError> {
        let now = Utc::now().timestamp();
        sqlx::query("UPDATE feeds SET last_fetched = ? WHERE id = ?")
            .bind(now)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, NewFeed, NewFeedItem};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_feed(id: i64) -> NewFeed {
        NewFeed {
            title: format!("Test Feed {}", id),
            url: format!("https://feed{}.example.com", id),
            feed_url: format!("https://feed{}.example.com/rss", id),
            description: None,
        }
    }

    fn test_item(link: &str) -> NewFeedItem {
        NewFeedItem {
            title: "Item".to_string(),
            link: link.to_string(),
            description: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_feed() {
        let db = test_db().await;
        let feed = db.insert_feed(&test_feed(1)).await.unwrap();

        assert!(feed.id > 0);
        assert_eq!(feed.title, "Test Feed 1");
        assert_eq!(feed.feed_url, "https://feed1.example.com/rss");
        assert!(feed.last_fetched.is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_feed_url_rejected() {
        let db = test_db().await;
        db.insert_feed(&test_feed(1)).await.unwrap();

        let err = db.insert_feed(&test_feed(1)).await.unwrap_err();
        assert!(
            matches!(err, DatabaseError::Duplicate(ref url) if url == "https://feed1.example.com/rss"),
            "unexpected error: {err:?}"
        );
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_feed_if_absent() {
        let db = test_db().await;
        assert!(db.insert_feed_if_absent(&test_feed(1)).await.unwrap().is_some());
        assert!(db.insert_feed_if_absent(&test_feed(1)).await.unwrap().is_none());
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_feeds_in_subscription_order() {
        let db = test_db().await;
        for i in [3, 1, 2] {
            db.insert_feed(&test_feed(i)).await.unwrap();
        }

        let titles: Vec<_> = db
            .list_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, ["Test Feed 3", "Test Feed 1", "Test Feed 2"]);
    }

    #[tokio::test]
    async fn test_feed_url_exists() {
        let db = test_db().await;
        db.insert_feed(&test_feed(1)).await.unwrap();
        assert!(db.feed_url_exists("https://feed1.example.com/rss").await.unwrap());
        assert!(!db.feed_url_exists("https://feed2.example.com/rss").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_feed_removes_items() {
        let db = test_db().await;
        let feed = db.insert_feed(&test_feed(1)).await.unwrap();
        let other = db.insert_feed(&test_feed(2)).await.unwrap();

        for i in 0..3 {
            db.insert_feed_item(feed.id, &test_item(&format!("https://a/{i}")))
                .await
                .unwrap();
        }
        db.insert_feed_item(other.id, &test_item("https://b/0"))
            .await
            .unwrap();

        let removed = db.delete_feed(feed.id).await.unwrap();
        assert_eq!(removed, Some(3));
        assert!(db.get_feed(feed.id).await.unwrap().is_none());
        assert!(db.items_for_feed(feed.id).await.unwrap().is_empty());
        assert_eq!(db.items_for_feed(other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_feed() {
        let db = test_db().await;
        assert_eq!(db.delete_feed(99999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_touch_feed_fetched() {
        let db = test_db().await;
        let feed = db.insert_feed(&test_feed(1)).await.unwrap();

        db.touch_feed_fetched(feed.id).await.unwrap();

        let feed = db.get_feed(feed.id).await.unwrap().unwrap();
        assert!(feed.last_fetched.is_some(), "last_fetched should be set");
    }
}
