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


//! Local storage quota probe
//!
//! Read-only view of how much room the offline store has left.
//!
//! - `usage`: bytes under the data directory (blobs + metadata database)
//! - `quota`: `usage + free disk space`, capped by the configured limit
//! - `available`: `quota - usage`
//!
//! When the estimate cannot be computed the probe answers permissively
//! instead of failing the caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Snapshot of local storage usage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    /// Bytes used by the offline store
    pub usage: u64,

    /// Bytes the offline store may use in total; 0 when unknown
    pub quota: u64,

    /// Bytes still free for the offline store
    pub available: u64,

    /// `usage / quota * 100`, 0 when quota is unknown
    pub usage_percent: f64,
}

impl StorageInfo {
    pub fn new(usage: u64, quota: u64) -> Self {
        let usage_percent = if quota == 0 {
            0.0
        } else {
            usage as f64 / quota as f64 * 100.0
        };
        Self {
            usage,
            quota,
            available: quota.saturating_sub(usage),
            usage_percent,
        }
    }

    /// Permissive default used when estimation is unavailable
    pub fn unknown() -> Self {
        Self {
            usage: 0,
            quota: 0,
            available: u64::MAX,
            usage_percent: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.quota > 0
    }
}

/// Quota probe over the offline data directory
#[derive(Debug, Clone)]
pub struct QuotaProbe {
    data_dir: PathBuf,
    limit: Option<u64>,
}

impl QuotaProbe {
    pub fn new<P: Into<PathBuf>>(data_dir: P, limit: Option<u64>) -> Self {
        Self {
            data_dir: data_dir.into(),
            limit,
        }
    }

    /// Current usage and quota
    pub async fn storage_info(&self) -> StorageInfo {
        let data_dir = self.data_dir.clone();
        let limit = self.limit;

        let estimate = tokio::task::spawn_blocking(move || estimate(&data_dir, limit)).await;

        match estimate {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                warn!(error = %e, dir = %self.data_dir.display(), "storage estimate unavailable");
                StorageInfo::unknown()
            }
            Err(e) => {
                warn!(error = %e, "storage estimate task failed");
                StorageInfo::unknown()
            }
        }
    }

    /// Whether `required_bytes` more would still fit
    pub async fn has_enough_space(&self, required_bytes: u64) -> bool {
        self.storage_info().await.available >= required_bytes
    }
}

fn estimate(data_dir: &Path, limit: Option<u64>) -> std::io::Result<StorageInfo> {
    let usage = directory_size(data_dir)?;
    let free = fs2::available_space(data_dir)?;

    let mut quota = usage.saturating_add(free);
    if let Some(limit) = limit {
        quota = quota.min(limit);
    }

    Ok(StorageInfo::new(usage, quota))
}

fn directory_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += directory_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_info_math() {
        let info = StorageInfo::new(250, 1000);
        assert_eq!(info.available, 750);
        assert_eq!(info.usage_percent, 25.0);

        let over = StorageInfo::new(1200, 1000);
        assert_eq!(over.available, 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_permissive() {
        let probe = QuotaProbe::new("/definitely/not/a/real/offline/dir", None);
        let info = probe.storage_info().await;

        assert!(!info.is_known());
        assert!(probe.has_enough_space(u64::MAX).await);
    }

    #[tokio::test]
    async fn test_usage_counts_nested_files_and_limit_caps_quota() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("blobs")).unwrap();
        std::fs::write(dir.path().join("blobs").join("a.blob"), vec![0u8; 300]).unwrap();
        std::fs::write(dir.path().join("offline.db"), vec![0u8; 200]).unwrap();

        let probe = QuotaProbe::new(dir.path(), Some(1000));
        let info = probe.storage_info().await;

        assert_eq!(info.usage, 500);
        assert_eq!(info.quota, 1000);
        assert_eq!(info.available, 500);
        assert!(probe.has_enough_space(500).await);
        assert!(!probe.has_enough_space(501).await);
    }
}
