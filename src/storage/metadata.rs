// Offline Lessons - Offline lesson sync for the learning platform
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Metadata store for downloaded lessons
//!
//! A single logical table keyed by `video-<id>`. Every operation is one
//! statement and therefore one SQLite transaction; failures are returned to
//! the caller as storage errors, never swallowed here.

use crate::error::{OfflineError, Result};
use crate::storage::database::Database;
use crate::storage::models::VideoMetadata;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Async key-indexed record store for `VideoMetadata`
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or fully replace the record with the same `id`
    async fn put(&self, record: &VideoMetadata) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<VideoMetadata>>;

    /// All records, most recent download first
    async fn get_all(&self) -> Result<Vec<VideoMetadata>>;

    /// Remove one record; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// SQLite-backed metadata store
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    fn row_to_record(row: SqliteRow) -> Result<VideoMetadata> {
        let id: String = row.try_get("id")?;

        let subtitles_json: String = row.try_get("subtitle_urls")?;
        let subtitle_urls: Vec<String> =
            serde_json::from_str(&subtitles_json).map_err(|e| OfflineError::CorruptRecord {
                key: id.clone(),
                reason: format!("subtitle_urls: {}", e),
            })?;

        let downloaded_at: String = row.try_get("downloaded_at")?;
        let downloaded_at = DateTime::parse_from_rfc3339(&downloaded_at)
            .map_err(|e| OfflineError::CorruptRecord {
                key: id.clone(),
                reason: format!("downloaded_at: {}", e),
            })?
            .with_timezone(&Utc);

        Ok(VideoMetadata {
            video_id: row.try_get("video_id")?,
            title: row.try_get("title")?,
            video_url: row.try_get("video_url")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            subtitle_urls,
            size: row.try_get::<i64, _>("size")?.max(0) as u64,
            downloaded_at,
            id,
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put(&self, record: &VideoMetadata) -> Result<()> {
        let subtitles_json = serde_json::to_string(&record.subtitle_urls)?;
        let size = i64::try_from(record.size)
            .map_err(|_| OfflineError::invalid_input(format!("size out of range: {}", record.size)))?;

        sqlx::query(
            r#"
            INSERT INTO OfflineVideos (
                id, video_id, title, video_url, thumbnail_url, subtitle_urls, size, downloaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                video_id = excluded.video_id,
                title = excluded.title,
                video_url = excluded.video_url,
                thumbnail_url = excluded.thumbnail_url,
                subtitle_urls = excluded.subtitle_urls,
                size = excluded.size,
                downloaded_at = excluded.downloaded_at
            "#,
        )
        .bind(&record.id)
        .bind(record.video_id)
        .bind(&record.title)
        .bind(&record.video_url)
        .bind(&record.thumbnail_url)
        .bind(&subtitles_json)
        .bind(size)
        .bind(record.downloaded_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        debug!(key = %record.id, size = record.size, "metadata stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<VideoMetadata>> {
        let row = sqlx::query("SELECT * FROM OfflineVideos WHERE id = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn get_all(&self) -> Result<Vec<VideoMetadata>> {
        let rows = sqlx::query("SELECT * FROM OfflineVideos ORDER BY downloaded_at DESC, id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM OfflineVideos WHERE id = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        debug!(key, "metadata deleted");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM OfflineVideos")
            .execute(&self.pool)
            .await?;

        debug!(removed = result.rows_affected(), "metadata cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::VideoDownloadRequest;
    use chrono::Duration;

    async fn store() -> SqliteMetadataStore {
        let db = Database::new_in_memory().await.unwrap();
        SqliteMetadataStore::new(&db)
    }

    fn record(video_id: i64, size: u64) -> VideoMetadata {
        VideoDownloadRequest::new(video_id, format!("Lesson {}", video_id), format!("https://x/v{}.mp4", video_id))
            .with_subtitles([format!("https://x/v{}.en.vtt", video_id)])
            .into_metadata(size, Utc::now())
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let store = store().await;
        let original = record(7, 1_007_000);

        store.put(&original).await.unwrap();
        let loaded = store.get("video-7").await.unwrap().unwrap();

        assert_eq!(loaded.title, "Lesson 7");
        assert_eq!(loaded.subtitle_urls, original.subtitle_urls);
        assert_eq!(loaded.size, 1_007_000);
        assert_eq!(loaded.thumbnail_url, None);
        assert_eq!(
            loaded.downloaded_at.timestamp_micros(),
            original.downloaded_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = store().await;
        assert!(store.get("video-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let store = store().await;
        store.put(&record(3, 100)).await.unwrap();

        let mut replacement = record(3, 250);
        replacement.title = "Lesson 3 (renamed)".to_string();
        replacement.subtitle_urls.clear();
        store.put(&replacement).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Lesson 3 (renamed)");
        assert_eq!(all[0].size, 250);
        assert!(all[0].subtitle_urls.is_empty());
    }

    #[tokio::test]
    async fn test_get_all_newest_first() {
        let store = store().await;
        let mut older = record(1, 10);
        older.downloaded_at = Utc::now() - Duration::hours(1);
        store.put(&older).await.unwrap();
        store.put(&record(2, 20)).await.unwrap();

        let ids: Vec<i64> = store.get_all().await.unwrap().iter().map(|r| r.video_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = store().await;
        store.put(&record(1, 10)).await.unwrap();
        store.put(&record(2, 20)).await.unwrap();

        store.delete("video-1").await.unwrap();
        store.delete("video-1").await.unwrap();
        assert!(store.get("video-1").await.unwrap().is_none());
        assert!(store.get("video-2").await.unwrap().is_some());

        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_pool_surfaces_error() {
        let db = Database::new_in_memory().await.unwrap();
        let store = SqliteMetadataStore::new(&db);
        db.pool().close().await;

        let err = store.get("video-1").await.unwrap_err();
        assert!(err.is_storage_error());
    }
}
