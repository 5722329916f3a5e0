use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::ListQuery;
use crate::application::repos::{Fetched, RepoError, SnippetRepo};
use crate::domain::snippets::Snippet;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SnippetRow {
    id: Uuid,
    content: String,
    tags: Vec<String>,
    created_at: OffsetDateTime,
    expires_at: Option<OffsetDateTime>,
}

impl From<SnippetRow> for Snippet {
    fn from(row: SnippetRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            tags: row.tags,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl SnippetRepo for PostgresRepositories {
    async fn insert(&self, snippet: &Snippet) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO snippets (id, content, tags, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snippet.id)
        .bind(&snippet.content)
        .bind(&snippet.tags)
        .bind(snippet.created_at)
        .bind(snippet.expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Fetched, RepoError> {
        let row = sqlx::query_as::<_, SnippetRow>(
            r#"
            SELECT id, content, tags, created_at, expires_at
            FROM snippets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| Fetched::from_store(Snippet::from(row)))
            .ok_or(RepoError::NotFound)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Snippet>, RepoError> {
        // A NULL tag bind disables the filter without a second query shape.
        let rows = sqlx::query_as::<_, SnippetRow>(
            r#"
            SELECT id, content, tags, created_at, expires_at
            FROM snippets
            WHERE $1::text IS NULL OR $1 = ANY(tags)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(query.tag.as_deref())
        .bind(i64::from(query.limit))
        .bind(query.offset())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Snippet::from).collect())
    }

    async fn update(&self, snippet: &Snippet) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE snippets
            SET content = $2,
                tags = $3,
                expires_at = $4
            WHERE id = $1
            "#,
        )
        .bind(snippet.id)
        .bind(&snippet.content)
        .bind(&snippet.tags)
        .bind(snippet.expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
