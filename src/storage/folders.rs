use chrono::Utc;

use super::schema::Database;
use super::types::{from_unix, DatabaseError, Folder};

impl Database {
    // ========================================================================
    // Folder Operations
    // ========================================================================

    /// Maximum nesting depth for folders.
    /// Root = depth 0, child = depth 1, grandchild = depth 2.
    const MAX_FOLDER_DEPTH: i64 = 3;

    /// Strips control characters, trims whitespace, and rejects empty names.
    fn sanitize_folder_name(name: &str) -> Result<String, DatabaseError> {
        let sanitized: String = name.chars().filter(|c| !c.is_control()).collect();
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            return Err(DatabaseError::InvalidInput(
                "Folder name cannot be empty or whitespace-only".to_string(),
            ));
        }
        Ok(trimmed.to_owned())
    }

    /// Create a folder, optionally nested under `parent_id`.
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Folder, DatabaseError> {
        let clean_name = Self::sanitize_folder_name(name)?;

        if let Some(pid) = parent_id {
            let depth = self.ancestor_depth(pid).await?.ok_or_else(|| {
                DatabaseError::InvalidInput(format!("Parent folder {pid} does not exist"))
            })?;
            if depth + 1 >= Self::MAX_FOLDER_DEPTH {
                return Err(DatabaseError::InvalidInput(format!(
                    "Maximum folder nesting depth ({}) would be exceeded",
                    Self::MAX_FOLDER_DEPTH
                )));
            }
        }

        let now = Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO folders (name, parent_id, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&clean_name)
        .bind(parent_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Folder {
            id,
            name: clean_name,
            parent_id,
            created_at: from_unix(now),
        })
    }

    /// Delete a folder. Its feeds become unfiled and child folders become roots.
    pub async fn delete_folder(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE feeds SET folder_id = NULL WHERE folder_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        // ON DELETE SET NULL handles child folders
        let removed = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed > 0)
    }

    /// File a feed under a folder, or unfile it with `None`.
    pub async fn move_feed_to_folder(
        &self,
        feed_id: i64,
        folder_id: Option<i64>,
    ) -> Result<bool, DatabaseError> {
        let updated = sqlx::query("UPDATE feeds SET folder_id = ? WHERE id = ?")
            .bind(folder_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    /// All folders as a flat list; callers build the tree from `parent_id`.
    pub async fn list_folders(&self) -> Result<Vec<Folder>, DatabaseError> {
        let rows: Vec<(i64, String, Option<i64>, i64)> = sqlx::query_as(
            "SELECT id, name, parent_id, created_at FROM folders ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, parent_id, created_at)| Folder {
                id,
                name,
                parent_id,
                created_at: from_unix(created_at),
            })
            .collect())
    }

    /// Depth of a folder (roots are 0), or `None` if it does not exist.
    ///
    /// LIMIT 50 on the recursive CTE stops runaway recursion on cyclic data.
    async fn ancestor_depth(&self, folder_id: i64) -> Result<Option<i64>, DatabaseError> {
        let (depth,): (Option<i64>,) = sqlx::query_as(
            r#"
            WITH RECURSIVE ancestors(id, parent_id, depth) AS (
                SELECT id, parent_id, 0 FROM folders WHERE id = ?
                UNION ALL
                SELECT f.id, f.parent_id, a.depth + 1
                FROM folders f
                JOIN ancestors a ON f.id = a.parent_id
                LIMIT 50
            )
            SELECT MAX(depth) FROM ancestors
            "#,
        )
        .bind(folder_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(depth)
    }
}
