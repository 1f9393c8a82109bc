use crate::models::VideoRecord;
use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VideoStoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("video {0} does not exist")]
    Missing(Uuid),
}

/// Key-value access to video records, keyed by video id
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get_video(&self, id: Uuid) -> Result<Option<VideoRecord>, VideoStoreError>;

    async fn update_video(&self, video: &VideoRecord) -> Result<(), VideoStoreError>;

    async fn create_video(&self, video: &VideoRecord) -> Result<(), VideoStoreError>;

    /// Videos owned by `user_id`, newest first
    async fn list_videos(&self, user_id: Uuid) -> Result<Vec<VideoRecord>, VideoStoreError>;
}

/// PostgreSQL-backed [`VideoStore`]
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn video_from_row(row: &PgRow) -> Result<VideoRecord, VideoStoreError> {
        let video = VideoRecord {
            id: row.try_get("id").map_err(DatabaseError::Query)?,
            user_id: row.try_get("user_id").map_err(DatabaseError::Query)?,
            title: row.try_get("title").map_err(DatabaseError::Query)?,
            description: row.try_get("description").map_err(DatabaseError::Query)?,
            thumbnail_url: row.try_get("thumbnail_url").map_err(DatabaseError::Query)?,
            video_url: row.try_get("video_url").map_err(DatabaseError::Query)?,
            created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
            updated_at: row.try_get("updated_at").map_err(DatabaseError::Query)?,
        };
        Ok(video)
    }
}

#[async_trait]
impl VideoStore for Database {
    async fn get_video(&self, id: Uuid) -> Result<Option<VideoRecord>, VideoStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref().map(Self::video_from_row).transpose()
    }

    async fn update_video(&self, video: &VideoRecord) -> Result<(), VideoStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = $2, description = $3, thumbnail_url = $4, video_url = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        if result.rows_affected() == 0 {
            return Err(VideoStoreError::Missing(video.id));
        }

        Ok(())
    }

    async fn create_video(&self, video: &VideoRecord) -> Result<(), VideoStoreError> {
        sqlx::query(
            r#"
            INSERT INTO videos (id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(video.id)
        .bind(video.user_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn list_videos(&self, user_id: Uuid) -> Result<Vec<VideoRecord>, VideoStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at
            FROM videos
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter().map(Self::video_from_row).collect()
    }
}
