use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::aggregate::Aggregator;
use crate::cache::MemoryCache;
use crate::config::Config;
use crate::feed::HttpFeedSource;
use crate::ingest::Ingestor;
use crate::registry::FeedRegistry;
use crate::storage::Database;
use crate::trending::HackerNewsClient;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub aggregator: Aggregator,
    pub registry: FeedRegistry,
}

impl AppState {
    pub fn new(ingestor: Ingestor, allow_private_hosts: bool) -> Self {
        Self {
            aggregator: Aggregator::new(ingestor.clone()),
            registry: FeedRegistry::new(ingestor.clone()).allow_private_hosts(allow_private_hosts),
            ingestor,
        }
    }

    /// Open the database and cache and build the production adapters.
    pub async fn from_config(cfg: &Config) -> Result<Self> {
        let db = Database::open(&cfg.database_path)
            .await
            .with_context(|| format!("could not open the database `{}`", cfg.database_path))?;

        let capacity = NonZeroUsize::new(cfg.cache_capacity).context("cache_capacity must be non-zero")?;
        let cache = Arc::new(MemoryCache::new(capacity));

        let client = reqwest::Client::builder()
            .timeout(cfg.http_timeout())
            .user_agent(concat!("newsmux/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("could not build the HTTP client")?;
        let policy = cfg.retry_policy();

        let trending = Arc::new(HackerNewsClient::new(
            client.clone(),
            &cfg.trending_base_url,
            policy,
        ));
        let feeds = Arc::new(HttpFeedSource::new(client, policy));

        let ingestor = Ingestor::new(db, cache, trending, feeds)
            .with_cache_ttl(cfg.cache_ttl())
            .with_concurrency(cfg.fetch_concurrency);

        Ok(Self::new(ingestor, cfg.allow_private_feed_hosts))
    }

    /// Drop cached entries and close the database pool.
    pub async fn shutdown(&self) {
        self.ingestor.cache().clear();
        self.ingestor.db().close().await;
        tracing::info!("Cache cleared and database closed");
    }
}
