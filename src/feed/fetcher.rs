use futures::future::{BoxFuture, FutureExt};

use crate::feed::parser::{parse_feed, FeedEntry};
use crate::http::{fetch_bytes, FetchError, RetryPolicy};

/// Something that can turn a feed URL into its current entries.
///
/// The ingestion pipeline depends on this trait rather than on HTTP so tests
/// can substitute an in-memory source.
pub trait FeedSource: Send + Sync {
    fn fetch_entries<'a>(
        &'a self,
        feed_url: &'a str,
    ) -> BoxFuture<'a, Result<Vec<FeedEntry>, FetchError>>;
}

/// Fetches feeds over HTTP and parses them with `feed-rs`.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    async fn fetch(&self, feed_url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        let bytes = fetch_bytes(&self.client, feed_url, &self.policy).await?;
        let entries = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(feed = %feed_url, entries = entries.len(), "Feed parsed");
        Ok(entries)
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch_entries<'a>(
        &'a self,
        feed_url: &'a str,
    ) -> BoxFuture<'a, Result<Vec<FeedEntry>, FetchError>> {
        self.fetch(feed_url).boxed()
    }
}
