//! Feed subscription management.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feed::parse_opml;
use crate::ingest::Ingestor;
use crate::storage::{Database, Feed, FeedItem, Folder, NewFeed};
use crate::util::validate_feed_url;

/// Subscriptions added on first start.
pub fn default_feeds() -> Vec<NewFeed> {
    [
        (
            "Dev.to",
            "https://dev.to",
            "https://dev.to/feed",
            "Developer Community and Programming Articles",
        ),
        (
            "TechCrunch",
            "https://techcrunch.com",
            "https://techcrunch.com/feed/",
            "Startup and Technology News",
        ),
        (
            "The Verge",
            "https://www.theverge.com",
            "https://www.theverge.com/rss/index.xml",
            "Technology and Culture",
        ),
        (
            "Ars Technica",
            "https://arstechnica.com",
            "https://feeds.arstechnica.com/arstechnica/index",
            "Technology and Science News",
        ),
    ]
    .into_iter()
    .map(|(title, url, feed_url, description)| NewFeed {
        title: title.to_string(),
        url: url.to_string(),
        feed_url: feed_url.to_string(),
        description: Some(description.to_string()),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub feed: String,
    pub error: String,
}

/// Outcome of a bulk import. One bad descriptor never aborts the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub added: Vec<NewFeed>,
    /// Feed URLs that were already subscribed
    pub skipped: Vec<String>,
    pub failed: Vec<ImportFailure>,
    pub parse_errors: Vec<String>,
    pub total_found: usize,
}

#[derive(Clone)]
pub struct FeedRegistry {
    ingestor: Ingestor,
    allow_private_hosts: bool,
}

impl FeedRegistry {
    pub fn new(ingestor: Ingestor) -> Self {
        Self {
            ingestor,
            allow_private_hosts: false,
        }
    }

    /// Accept feed URLs on loopback and private networks.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    fn db(&self) -> &Database {
        self.ingestor.db()
    }

    pub async fn list(&self) -> Result<Vec<Feed>> {
        Ok(self.db().list_feeds().await?)
    }

    /// Subscribe and seed the new feed with one refresh.
    pub async fn create(&self, new_feed: NewFeed) -> Result<Feed> {
        let new_feed = self.validate(new_feed)?;

        if self.db().feed_url_exists(&new_feed.feed_url).await? {
            return Err(Error::DuplicateFeed(new_feed.feed_url));
        }
        // A concurrent create can still win the race; the unique index turns
        // that into DuplicateFeed as well.
        let feed = self.db().insert_feed(&new_feed).await?;
        tracing::info!(feed_id = feed.id, feed_url = %feed.feed_url, "Feed subscribed");

        let seeded = self.ingestor.fetch_feed(feed.id).await?;
        tracing::debug!(feed_id = feed.id, items = seeded.len(), "Feed seeded");

        Ok(self.db().get_feed(feed.id).await?.unwrap_or(feed))
    }

    fn validate(&self, mut new_feed: NewFeed) -> Result<NewFeed> {
        new_feed.title = new_feed.title.trim().to_string();
        if new_feed.title.is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        if new_feed.feed_url.trim().is_empty() {
            return Err(Error::Validation("feed_url must not be empty".to_string()));
        }
        let parsed = validate_feed_url(&new_feed.feed_url, self.allow_private_hosts)
            .map_err(|e| Error::Validation(format!("feed_url: {e}")))?;
        new_feed.feed_url = parsed.to_string();
        Ok(new_feed)
    }

    /// Remove a subscription and all of its items.
    pub async fn delete(&self, feed_id: i64) -> Result<()> {
        match self.db().delete_feed(feed_id).await? {
            Some(items) => {
                tracing::info!(feed_id, items, "Feed deleted");
                Ok(())
            }
            None => Err(Error::NotFound(format!("Feed {feed_id}"))),
        }
    }

    /// Force a refresh of one subscription.
    pub async fn refresh(&self, feed_id: i64) -> Result<(Feed, Vec<FeedItem>)> {
        let feed = self.get(feed_id).await?;
        let items = self.ingestor.fetch_feed(feed_id).await?;
        Ok((feed, items))
    }

    /// Refresh one subscription, then list what is stored for it, newest first.
    ///
    /// Capped at [`MAX_ITEMS_PER_QUERY`](crate::storage::MAX_ITEMS_PER_QUERY)
    /// items; a feed with a longer history only returns its newest ones.
    pub async fn items(&self, feed_id: i64) -> Result<Vec<FeedItem>> {
        self.get(feed_id).await?;
        self.ingestor.fetch_feed(feed_id).await?;
        Ok(self.db().items_for_feed(feed_id).await?)
    }

    pub async fn get(&self, feed_id: i64) -> Result<Feed> {
        self.db()
            .get_feed(feed_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Feed {feed_id}")))
    }

    /// Subscribe to each descriptor in turn.
    ///
    /// Already-subscribed URLs are reported as skipped; any error creating or
    /// seeding a descriptor is recorded against it and the batch continues.
    pub async fn import_bulk(&self, descriptors: Vec<NewFeed>) -> ImportReport {
        let mut report = ImportReport {
            total_found: descriptors.len(),
            ..Default::default()
        };

        for descriptor in descriptors {
            let feed_url = descriptor.feed_url.clone();
            match self.import_one(descriptor.clone()).await {
                Ok(true) => report.added.push(descriptor),
                Ok(false) => report.skipped.push(feed_url),
                Err(e) => {
                    tracing::warn!(feed_url = %feed_url, error = %e, "Import of feed failed");
                    report.failed.push(ImportFailure {
                        feed: feed_url,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            total = report.total_found,
            added = report.added.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Bulk import finished"
        );
        report
    }

    /// `Ok(false)` when the feed already exists.
    async fn import_one(&self, descriptor: NewFeed) -> Result<bool> {
        if self.db().feed_url_exists(&descriptor.feed_url).await? {
            return Ok(false);
        }
        match self.create(descriptor).await {
            Ok(_) => Ok(true),
            // Normalization can map a distinct spelling onto an existing URL
            Err(Error::DuplicateFeed(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Parse an OPML document and import every feed it lists.
    pub async fn import_opml(&self, content: &str) -> ImportReport {
        let (descriptors, parse_errors) = parse_opml(content);
        let mut report = self.import_bulk(descriptors).await;
        report.parse_errors = parse_errors;
        report
    }

    /// Subscribe to [`default_feeds`] that are not already present. No seed fetch.
    pub async fn seed_defaults(&self) -> Result<usize> {
        let mut added = 0;
        for feed in default_feeds() {
            if self.db().insert_feed_if_absent(&feed).await?.is_some() {
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!(added, "Default feeds subscribed");
        }
        Ok(added)
    }

    // ========================================================================
    // Folders
    // ========================================================================

    pub async fn folders(&self) -> Result<Vec<Folder>> {
        Ok(self.db().list_folders().await?)
    }

    pub async fn create_folder(&self, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        Ok(self.db().create_folder(name, parent_id).await?)
    }

    pub async fn delete_folder(&self, folder_id: i64) -> Result<()> {
        if self.db().delete_folder(folder_id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Folder {folder_id}")))
        }
    }

    pub async fn move_feed(&self, feed_id: i64, folder_id: Option<i64>) -> Result<()> {
        if let Some(folder_id) = folder_id {
            let known = self.db().list_folders().await?;
            if !known.iter().any(|f| f.id == folder_id) {
                return Err(Error::NotFound(format!("Folder {folder_id}")));
            }
        }
        if self.db().move_feed_to_folder(feed_id, folder_id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Feed {feed_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, harness, FakeTrending, Harness};
    use pretty_assertions::assert_eq;

    fn descriptor(title: &str, feed_url: &str) -> NewFeed {
        NewFeed {
            title: title.to_string(),
            url: String::new(),
            feed_url: feed_url.to_string(),
            description: None,
        }
    }

    async fn registry() -> (Harness, FeedRegistry) {
        let h = harness(FakeTrending::default()).await;
        let registry = FeedRegistry::new(h.ingestor.clone());
        (h, registry)
    }

    #[tokio::test]
    async fn test_create_seeds_items() {
        let (h, registry) = registry().await;
        h.feeds.serve(
            "https://example.com/feed",
            vec![entry("https://example.com/1", None)],
        );

        let feed = registry
            .create(descriptor("  Example ", "https://example.com/feed"))
            .await
            .unwrap();

        assert_eq!(feed.title, "Example");
        assert!(feed.last_fetched.is_some());
        assert_eq!(h.db.count_feed_items(feed.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_duplicate() {
        let (h, registry) = registry().await;

        registry
            .create(descriptor("Example", "https://example.com/feed"))
            .await
            .unwrap();
        let err = registry
            .create(descriptor("Again", "https://example.com/feed"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateFeed(_)), "got {err:?}");
        assert_eq!(h.db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_h, registry) = registry().await;

        for bad in [
            descriptor("", "https://example.com/feed"),
            descriptor("Feed", ""),
            descriptor("Feed", "ftp://example.com/feed"),
            descriptor("Feed", "http://192.168.0.10/feed"),
        ] {
            let err = registry.create(bad.clone()).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{bad:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_private_hosts_opt_in() {
        let (_h, registry) = registry().await;
        let registry = registry.allow_private_hosts(true);

        let feed = registry
            .create(descriptor("Local", "http://127.0.0.1:9/feed"))
            .await
            .unwrap();
        assert_eq!(feed.feed_url, "http://127.0.0.1:9/feed");
    }

    #[tokio::test]
    async fn test_delete_and_not_found() {
        let (h, registry) = registry().await;
        h.feeds.serve(
            "https://example.com/feed",
            vec![
                entry("https://example.com/1", None),
                entry("https://example.com/2", None),
            ],
        );
        let feed = registry
            .create(descriptor("Example", "https://example.com/feed"))
            .await
            .unwrap();

        registry.delete(feed.id).await.unwrap();
        assert_eq!(h.db.count_feed_items(feed.id).await.unwrap(), 0);
        assert!(registry.list().await.unwrap().is_empty());

        let err = registry.delete(feed.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = registry.refresh(feed.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_import_isolates_failures() {
        let (_h, registry) = registry().await;

        let report = registry
            .import_bulk(vec![
                descriptor("One", "https://one.example.com/feed"),
                descriptor("Broken", ""),
                descriptor("Two", "https://two.example.com/feed"),
            ])
            .await;

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.skipped.len(), 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].feed, "");
        assert_eq!(report.total_found, 3);
    }

    #[tokio::test]
    async fn test_import_skips_existing() {
        let (_h, registry) = registry().await;
        registry
            .create(descriptor("One", "https://one.example.com/feed"))
            .await
            .unwrap();

        let report = registry
            .import_bulk(vec![
                descriptor("One again", "https://one.example.com/feed"),
                descriptor("Two", "https://two.example.com/feed"),
            ])
            .await;

        assert_eq!(report.skipped, vec!["https://one.example.com/feed".to_string()]);
        assert_eq!(report.added.len(), 1);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_import_opml_reports_parse_errors() {
        let (_h, registry) = registry().await;
        let content = r#"<opml><body>
            <outline text="A" xmlUrl="https://a.example.com/feed"/>
            <outline text="B" xmlUrl="https://b.example.com/feed">
        </body></opml>"#;

        let report = registry.import_opml(content).await;
        assert_eq!(report.total_found, 2);
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.parse_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_defaults_idempotent() {
        let (h, registry) = registry().await;

        assert_eq!(registry.seed_defaults().await.unwrap(), 4);
        assert_eq!(registry.seed_defaults().await.unwrap(), 0);
        assert_eq!(h.db.list_feeds().await.unwrap().len(), 4);
        assert_eq!(h.feeds.calls(), 0);
    }

    #[tokio::test]
    async fn test_folder_annotation() {
        let (_h, registry) = registry().await;
        let feed = registry
            .create(descriptor("Example", "https://example.com/feed"))
            .await
            .unwrap();
        let folder = registry.create_folder("Tech", None).await.unwrap();

        registry.move_feed(feed.id, Some(folder.id)).await.unwrap();
        assert_eq!(registry.list().await.unwrap()[0].folder_id, Some(folder.id));

        let err = registry.move_feed(feed.id, Some(999)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        registry.delete_folder(folder.id).await.unwrap();
        assert_eq!(registry.list().await.unwrap()[0].folder_id, None);

        let err = registry.create_folder("  ", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
