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


//! Engine configuration
//!
//! # Data Directory Layout
//! ```text
//! <data_dir>/
//!   offline.db      metadata store (SQLite)
//!   blobs/          blob cache, one file per locator
//! ```
//!
//! # Data Directory Location
//! - Desktop (macOS): ~/Library/Application Support/OfflineLessons
//! - Desktop (Linux): ~/.local/share/OfflineLessons
//! - Desktop (Windows): %APPDATA%/OfflineLessons
//! - Override with `OFFLINE_LESSONS_DATA_DIR`

use crate::error::{OfflineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "OFFLINE_LESSONS_DATA_DIR";

/// Offline engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Root directory holding both stores
    pub data_dir: PathBuf,

    /// Metadata database file name, relative to `data_dir`
    pub database_file: String,

    /// Blob cache directory name, relative to `data_dir`
    pub blob_dir: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// User-Agent sent with every fetch
    pub user_agent: String,

    /// Upper bound on offline storage; `None` means only disk space limits it
    pub quota_limit_bytes: Option<u64>,

    /// Serialize concurrent downloads/deletes of the same video
    pub serialize_same_video: bool,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            database_file: "offline.db".to_string(),
            blob_dir: "blobs".to_string(),
            request_timeout_secs: 300,
            user_agent: concat!("offline-lessons/", env!("CARGO_PKG_VERSION")).to_string(),
            quota_limit_bytes: None,
            serialize_same_video: true,
        }
    }
}

impl OfflineConfig {
    /// Configuration rooted at `data_dir` with everything else defaulted
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults. `OFFLINE_LESSONS_DATA_DIR`, when
    /// set, wins over the file's `data_dir`.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            OfflineError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&json)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(OfflineError::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(OfflineError::Configuration("user_agent must not be empty".to_string()));
        }
        if self.database_file.trim().is_empty() || self.blob_dir.trim().is_empty() {
            return Err(OfflineError::Configuration(
                "database_file and blob_dir must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn blob_path(&self) -> PathBuf {
        self.data_dir.join(&self.blob_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get default data directory for the platform
    pub fn default_data_dir() -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("OfflineLessons")
        }

        #[cfg(target_os = "linux")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("OfflineLessons")
        }

        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("OfflineLessons")
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            PathBuf::from("./OfflineLessons")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = OfflineConfig::with_data_dir("/tmp/offline");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/offline/offline.db"));
        assert_eq!(config.blob_path(), PathBuf::from("/tmp/offline/blobs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = OfflineConfig {
            request_timeout_secs: 0,
            ..OfflineConfig::with_data_dir("/tmp/offline")
        };
        assert!(matches!(config.validate(), Err(OfflineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "request_timeout_secs": 30, "quota_limit_bytes": 1024 }"#)
            .await
            .unwrap();

        let config = OfflineConfig::load(&path).await.unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.quota_limit_bytes, Some(1024));
        assert_eq!(config.blob_dir, "blobs");
        assert!(config.serialize_same_video);
    }
}
