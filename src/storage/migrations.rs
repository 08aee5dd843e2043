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


//! Schema migrations for the metadata database
//!
//! Applied at runtime in id order; each applied id is recorded in
//! `_migrations` and skipped on the next open.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};
use tracing::info;

/// Apply every migration not yet recorded
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_migrations_table(pool).await?;

    run_migration(pool, 1, "offline_videos", create_offline_videos(pool)).await?;

    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .await?;

    Ok(())
}

async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    apply: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if applied > 0 {
        return Ok(());
    }

    apply.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    info!(id, name, "migration applied");
    Ok(())
}

/// Metadata table for downloaded lessons
async fn create_offline_videos(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
-- One row per cached lesson, keyed by 'video-<video_id>'
CREATE TABLE IF NOT EXISTS OfflineVideos (
    id TEXT PRIMARY KEY NOT NULL,
    video_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    video_url TEXT NOT NULL,
    thumbnail_url TEXT,
    subtitle_urls TEXT NOT NULL DEFAULT '[]',  -- JSON array of locators
    size INTEGER NOT NULL DEFAULT 0,
    downloaded_at TEXT NOT NULL               -- RFC 3339, UTC
);

CREATE INDEX IF NOT EXISTS idx_offline_videos_video_id ON OfflineVideos(video_id);
CREATE INDEX IF NOT EXISTS idx_offline_videos_downloaded_at ON OfflineVideos(downloaded_at);
        "#,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, 1);

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'OfflineVideos'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }
}
