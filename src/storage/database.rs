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


//! SQLite handle behind the metadata store
//!
//! A file-backed pool for real use and a single-connection in-memory pool for
//! tests. Migrations run on open.
//!
//! # Pragmas
//! - `journal_mode = WAL`, `synchronous = NORMAL`
//! - `auto_vacuum = INCREMENTAL`
//! - 30s busy timeout so concurrent writers queue instead of failing

use crate::error::{OfflineError, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    ConnectOptions,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Pooled SQLite connection for the metadata store
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,

    /// `None` when in-memory
    path: Option<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the database file and migrate it
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    OfflineError::Storage(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        Self::apply_pragmas(&pool).await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;

        Ok(db)
    }

    /// Private in-memory database, gone once the pool closes
    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        // A second connection would see a different in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await?;

        Self::apply_pragmas(&pool).await?;

        let db = Self { pool, path: None };
        db.migrate().await?;

        Ok(db)
    }

    async fn apply_pragmas(pool: &SqlitePool) -> Result<()> {
        sqlx::query("PRAGMA auto_vacuum = INCREMENTAL")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        crate::storage::migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| OfflineError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Wait for in-flight queries, then drop every connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// On-disk size in bytes including the WAL file; 0 when in-memory
    pub async fn get_size(&self) -> Result<u64> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let mut total = tokio::fs::metadata(path)
            .await
            .map_err(|e| {
                OfflineError::Storage(format!(
                    "Failed to get database size for {}: {}",
                    path.display(),
                    e
                ))
            })?
            .len();

        let mut wal = path.as_os_str().to_owned();
        wal.push("-wal");
        if let Ok(meta) = tokio::fs::metadata(PathBuf::from(wal)).await {
            total += meta.len();
        }

        Ok(total)
    }

    /// `PRAGMA integrity_check` reports "ok"
    pub async fn check_integrity(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }
}
