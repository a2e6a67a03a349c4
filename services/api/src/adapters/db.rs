//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ChapterService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quillify_core::domain::Chapter;
use quillify_core::ports::{ChapterService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ChapterService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChapterRecord {
    id: Uuid,
    story_id: Uuid,
    title: String,
    content: Option<String>,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            id: self.id,
            story_id: self.story_id,
            title: self.title,
            content: self.content,
            order_index: self.order_index,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const CHAPTER_COLUMNS: &str =
    "id, story_id, title, content, order_index, created_at, updated_at";

fn not_found(chapter_id: Uuid) -> PortError {
    PortError::NotFound(format!("Chapter {} not found", chapter_id))
}

//=========================================================================================
// `ChapterService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChapterService for DbAdapter {
    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        let records = sqlx::query_as::<_, ChapterRecord>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE story_id = $1 ORDER BY order_index ASC"
        ))
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = $1"
        ))
        .bind(chapter_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found(chapter_id),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn create_chapter(&self, story_id: Uuid, title: &str) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            "INSERT INTO chapters (id, story_id, title, content, order_index) \
             VALUES ($1, $2, $3, '', \
                 (SELECT COALESCE(MAX(order_index), -1) + 1 FROM chapters WHERE story_id = $2)) \
             RETURNING {CHAPTER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(story_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn update_chapter(&self, chapter_id: Uuid, title: &str, content: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE chapters SET title = $1, content = $2, updated_at = now() WHERE id = $3",
        )
        .bind(title)
        .bind(content)
        .bind(chapter_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(not_found(chapter_id));
        }
        Ok(())
    }

    async fn delete_chapter(&self, chapter_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(chapter_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(not_found(chapter_id));
        }
        Ok(())
    }
}
