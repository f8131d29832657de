use futures::stream::{self, StreamExt};

use super::Ingestor;
use crate::cache::{get_json, set_json};
use crate::error::{Error, Result};
use crate::storage::Story;

impl Ingestor {
    /// Current trending stories, at most `limit`, in ranking order.
    ///
    /// A cache hit is served from the store with no upstream call. On a miss
    /// the ranking is fetched once; each identifier is resolved from the store
    /// or, failing that, from the detail endpoint and persisted. A failed
    /// detail call skips that story, a failed ranking call fails the whole
    /// request.
    pub async fn fetch_trending(&self, limit: usize) -> Result<Vec<Story>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let key = format!("trending:top:{limit}");
        if let Some(ids) = get_json::<Vec<i64>>(self.cache(), &key) {
            tracing::debug!(key = %key, ids = ids.len(), "Trending cache hit");
            return Ok(self.db.stories_by_source_ids(&ids).await?);
        }
        tracing::debug!(key = %key, "Trending cache miss");

        let ids = self
            .trending
            .top_ids(limit)
            .await
            .map_err(Error::UpstreamUnavailable)?;

        let resolved: Vec<Option<Story>> = stream::iter(ids)
            .map(|id| self.resolve_story(id))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()?;
        let stories: Vec<Story> = resolved.into_iter().flatten().collect();

        let source_ids: Vec<i64> = stories.iter().map(|s| s.source_id).collect();
        set_json(self.cache(), &key, &source_ids, self.cache_ttl);

        tracing::info!(requested = limit, resolved = stories.len(), "Trending stories refreshed");
        Ok(stories)
    }

    /// Store first, then upstream. Upstream failures and non-stories are `None`.
    async fn resolve_story(&self, source_id: i64) -> Result<Option<Story>> {
        if let Some(story) = self.db.find_story(source_id).await? {
            return Ok(Some(story));
        }

        let fetched = match self.trending.item(source_id).await {
            Ok(Some(story)) => story,
            Ok(None) => {
                tracing::debug!(source_id, "Skipping item that is not a story");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(source_id, error = %e, "Story detail fetch failed, skipping");
                return Ok(None);
            }
        };

        // A concurrent request may have stored it first; insert_story returns
        // whichever row won.
        Ok(Some(self.db.insert_story(&fetched).await?))
    }
}
