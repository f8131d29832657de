//! Ingestion pipeline.
//!
//! Reconciles the upstream sources with the local store: the store is the
//! source of truth, the freshness cache only remembers which identifiers a
//! recent query resolved to. Upstream fan-out runs with bounded concurrency
//! and keeps input order.

mod feeds;
mod trending;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{FreshnessCache, DEFAULT_TTL};
use crate::feed::FeedSource;
use crate::storage::Database;
use crate::trending::TrendingSource;

pub use feeds::MAX_ENTRIES_PER_REFRESH;

/// Default number of upstream requests in flight per pipeline call
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    cache: Arc<dyn FreshnessCache>,
    trending: Arc<dyn TrendingSource>,
    feeds: Arc<dyn FeedSource>,
    cache_ttl: Duration,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        db: Database,
        cache: Arc<dyn FreshnessCache>,
        trending: Arc<dyn TrendingSource>,
        feeds: Arc<dyn FeedSource>,
    ) -> Self {
        Self {
            db,
            cache,
            trending,
            feeds,
            cache_ttl: DEFAULT_TTL,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &dyn FreshnessCache {
        self.cache.as_ref()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}
