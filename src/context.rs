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


//! Process-wide engine context
//!
//! Opens both stores once and hands out an orchestrator wired to them.
//! Nothing here is global; embedders keep the context alive for as long as
//! they need offline access and call `close` on shutdown.

use crate::config::OfflineConfig;
use crate::download::{DownloadOrchestrator, ProgressiveFetcher};
use crate::error::Result;
use crate::storage::{Database, FilesystemBlobCache, QuotaProbe, SqliteMetadataStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Open handles to the offline stores
pub struct OfflineContext {
    config: OfflineConfig,
    database: Database,
    orchestrator: DownloadOrchestrator,
}

impl OfflineContext {
    /// Open (creating if needed) the stores under `config.data_dir`
    pub async fn open(config: OfflineConfig) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let database = Database::new(config.database_path()).await?;
        if !database.check_integrity().await? {
            warn!(path = %config.database_path().display(), "metadata database failed integrity check");
        }
        let blobs = FilesystemBlobCache::new(config.blob_path()).await?;
        let fetcher = ProgressiveFetcher::from_config(&config)?;
        let quota = QuotaProbe::new(config.data_dir.clone(), config.quota_limit_bytes);

        let orchestrator = DownloadOrchestrator::new(
            fetcher,
            Arc::new(blobs),
            Arc::new(SqliteMetadataStore::new(&database)),
            quota,
        )
        .with_video_serialization(config.serialize_same_video);

        info!(data_dir = %config.data_dir.display(), "offline context opened");

        Ok(Self {
            config,
            database,
            orchestrator,
        })
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Orchestrator over this context's stores
    ///
    /// Clones share the in-flight lock map, so per-video serialization holds
    /// across them.
    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    /// Close the metadata database
    pub async fn close(self) -> Result<()> {
        self.database.close().await?;
        info!("offline context closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VideoDownloadRequest;
    use chrono::Utc;

    #[tokio::test]
    async fn test_open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = OfflineConfig::with_data_dir(dir.path().join("offline"));

        let context = OfflineContext::open(config.clone()).await.unwrap();
        assert!(config.database_path().exists());
        assert!(config.blob_path().is_dir());
        assert!(context
            .orchestrator()
            .get_all_downloaded_videos()
            .await
            .unwrap()
            .is_empty());
        context.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = OfflineConfig::with_data_dir(dir.path());

        let context = OfflineContext::open(config.clone()).await.unwrap();
        let record = VideoDownloadRequest::new(9, "Persisted", "https://x/v9.mp4")
            .into_metadata(42, Utc::now());
        context.orchestrator().metadata().put(&record).await.unwrap();
        context.close().await.unwrap();

        let reopened = OfflineContext::open(config).await.unwrap();
        assert!(reopened.orchestrator().is_video_downloaded(9).await.unwrap());
        assert_eq!(reopened.orchestrator().get_total_download_size().await.unwrap(), 42);
        reopened.close().await.unwrap();
    }
}
