use chrono::Utc;
use sqlx::QueryBuilder;
use std::collections::HashMap;

use super::schema::Database;
use super::types::{DatabaseError, NewStory, Story, StoryRow};

const STORY_COLUMNS: &str =
    "id, source_id, title, url, text, author, score, published_at, descendants, kind, created_at";

impl Database {
    // ========================================================================
    // Story Operations
    // ========================================================================

    pub async fn find_story(&self, source_id: i64) -> Result<Option<Story>, DatabaseError> {
        let row = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE source_id = ?"
        ))
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StoryRow::into_story))
    }

    /// Resolve upstream identifiers to stored stories, preserving the order of
    /// `source_ids`. Identifiers with no stored row are omitted.
    ///
    /// PERF-001: Chunks at 500 IDs per query to avoid SQLite bind-parameter limits.
    pub async fn stories_by_source_ids(
        &self,
        source_ids: &[i64],
    ) -> Result<Vec<Story>, DatabaseError> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }

        const CHUNK_SIZE: usize = 500;
        let mut found: HashMap<i64, Story> = HashMap::with_capacity(source_ids.len());

        for chunk in source_ids.chunks(CHUNK_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE source_id IN ("
            ));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows: Vec<StoryRow> = builder.build_query_as().fetch_all(&self.pool).await?;
            found.extend(rows.into_iter().map(|r| (r.source_id, r.into_story())));
        }

        Ok(source_ids
            .iter()
            .filter_map(|id| found.remove(id))
            .collect())
    }

    /// Store a story unless one with the same `source_id` already exists.
    ///
    /// Always returns the stored row. When the story was already present the
    /// first-seen values (score, comment count) are kept; the new payload is
    /// discarded.
    pub async fn insert_story(&self, story: &NewStory) -> Result<Story, DatabaseError> {
        let now = Utc::now().timestamp();
        let inserted = sqlx::query_as::<_, StoryRow>(&format!(
            "INSERT INTO stories
                (source_id, title, url, text, author, score, published_at, descendants, kind, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_id) DO NOTHING
             RETURNING {STORY_COLUMNS}"
        ))
        .bind(story.source_id)
        .bind(&story.title)
        .bind(&story.url)
        .bind(&story.text)
        .bind(&story.author)
        .bind(story.score)
        .bind(story.published_at.timestamp())
        .bind(story.descendants)
        .bind(&story.kind)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row.into_story());
        }

        tracing::debug!(source_id = story.source_id, "Story already stored, keeping first-seen row");
        self.find_story(story.source_id)
            .await?
            .ok_or_else(|| DatabaseError::Duplicate(story.source_id.to_string()))
    }

    pub async fn count_stories(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
