//! Snippet repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use snippetbox_core::{SnippetId, SnippetLifetime};

use super::RepositoryError;
use crate::models::Snippet;

/// How many snippets the home page lists.
pub const LATEST_LIMIT: i64 = 10;

/// Storage for snippets, as seen by request handlers.
#[async_trait]
pub trait SnippetStore: Send + Sync + 'static {
    /// Store a new snippet and return its id.
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires: SnippetLifetime,
    ) -> Result<SnippetId, RepositoryError>;

    /// Fetch an unexpired snippet.
    ///
    /// Returns `RepositoryError::NotFound` for unknown or expired ids.
    async fn get(&self, id: SnippetId) -> Result<Snippet, RepositoryError>;

    /// The ten most recently created unexpired snippets, newest first.
    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct SnippetRow {
    id: i32,
    title: String,
    content: String,
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
}

impl From<SnippetRow> for Snippet {
    fn from(row: SnippetRow) -> Self {
        Self {
            id: SnippetId::new(row.id),
            title: row.title,
            content: row.content,
            created: row.created,
            expires: row.expires,
        }
    }
}

/// `PostgreSQL` implementation of [`SnippetStore`].
#[derive(Clone)]
pub struct SnippetRepository {
    pool: PgPool,
}

impl SnippetRepository {
    /// Create a new snippet repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnippetStore for SnippetRepository {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires: SnippetLifetime,
    ) -> Result<SnippetId, RepositoryError> {
        let id = sqlx::query_scalar::<_, SnippetId>(
            r"
            INSERT INTO snippets (title, content, created, expires)
            VALUES ($1, $2, NOW(), NOW() + make_interval(days => $3))
            RETURNING id
            ",
        )
        .bind(title)
        .bind(content)
        .bind(expires.days())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get(&self, id: SnippetId) -> Result<Snippet, RepositoryError> {
        let row = sqlx::query_as::<_, SnippetRow>(
            r"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > NOW() AND id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Snippet::from).ok_or(RepositoryError::NotFound)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError> {
        let rows = sqlx::query_as::<_, SnippetRow>(
            r"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > NOW()
            ORDER BY id DESC
            LIMIT $1
            ",
        )
        .bind(LATEST_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Snippet::from).collect())
    }
}
