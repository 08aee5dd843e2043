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


//! Locator-keyed blob cache
//!
//! Raw resource bytes keyed by the exact locator string (no normalization,
//! `https://x/a` and `https://x/a?` are different entries).
//!
//! # On-disk Layout
//! Each entry lives in `<root>/<sha256(locator) as hex>.blob`. Writes go to a
//! hidden temp file in the same directory and are renamed into place, so a
//! reader never sees a half-written blob.

use crate::error::{OfflineError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const BLOB_EXTENSION: &str = "blob";

/// Content store mapping a locator to its bytes
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Store bytes under `locator`, replacing any previous entry
    async fn put(&self, locator: &str, bytes: Bytes) -> Result<()>;

    /// Read an entry; `None` when absent
    async fn get(&self, locator: &str) -> Result<Option<Bytes>>;

    /// Remove an entry; absent entries are not an error
    async fn delete(&self, locator: &str) -> Result<()>;

    /// Remove every entry in the namespace
    async fn delete_all(&self) -> Result<()>;

    async fn contains(&self, locator: &str) -> Result<bool>;

    /// Locally addressable file backing the entry, if present
    async fn local_path(&self, locator: &str) -> Result<Option<PathBuf>>;

    /// Bytes currently held by the cache
    async fn total_size(&self) -> Result<u64>;
}

/// Filesystem-backed blob cache
#[derive(Debug, Clone)]
pub struct FilesystemBlobCache {
    root: PathBuf,
}

impl FilesystemBlobCache {
    /// Open (creating if needed) a cache rooted at `root`
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            OfflineError::Storage(format!(
                "Failed to create blob directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a locator: hex SHA-256 of the exact string
    pub fn blob_name(locator: &str) -> String {
        let digest = Sha256::digest(locator.as_bytes());
        format!("{}.{}", hex::encode(digest), BLOB_EXTENSION)
    }

    fn blob_path(&self, locator: &str) -> PathBuf {
        self.root.join(Self::blob_name(locator))
    }

    /// Write to a temp file, sync, then rename over the target
    async fn atomic_write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));

        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(contents).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, path).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(OfflineError::Storage(format!(
                "Failed to write blob {}: {}",
                path.display(),
                e
            )));
        }

        Ok(())
    }

    fn is_blob_file(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXTENSION)
    }
}

#[async_trait]
impl BlobCache for FilesystemBlobCache {
    async fn put(&self, locator: &str, bytes: Bytes) -> Result<()> {
        let path = self.blob_path(locator);
        self.atomic_write(&path, &bytes).await?;
        debug!(locator, bytes = bytes.len(), "blob stored");
        Ok(())
    }

    async fn get(&self, locator: &str) -> Result<Option<Bytes>> {
        match fs::read(self.blob_path(locator)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OfflineError::Storage(format!(
                "Failed to read blob for {}: {}",
                locator, e
            ))),
        }
    }

    async fn delete(&self, locator: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(locator)).await {
            Ok(()) => {
                debug!(locator, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OfflineError::Storage(format!(
                "Failed to delete blob for {}: {}",
                locator, e
            ))),
        }
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.root).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        debug!(removed, root = %self.root.display(), "blob namespace cleared");
        Ok(())
    }

    async fn contains(&self, locator: &str) -> Result<bool> {
        Ok(fs::try_exists(self.blob_path(locator)).await?)
    }

    async fn local_path(&self, locator: &str) -> Result<Option<PathBuf>> {
        let path = self.blob_path(locator);
        if fs::try_exists(&path).await? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    async fn total_size(&self) -> Result<u64> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut total = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            if Self::is_blob_file(&entry.path()) {
                total += entry.metadata().await?.len();
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn cache() -> (TempDir, FilesystemBlobCache) {
        let dir = TempDir::new().unwrap();
        let cache = FilesystemBlobCache::new(dir.path().join("blobs")).await.unwrap();
        (dir, cache)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_dir, cache) = cache().await;
        let url = "https://x/v7.mp4";

        cache.put(url, Bytes::from_static(b"video")).await.unwrap();
        assert_eq!(cache.get(url).await.unwrap().unwrap(), Bytes::from_static(b"video"));
        assert!(cache.contains(url).await.unwrap());

        cache.delete(url).await.unwrap();
        assert!(cache.get(url).await.unwrap().is_none());
        assert!(!cache.contains(url).await.unwrap());

        // Deleting twice is fine
        cache.delete(url).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_dir, cache) = cache().await;
        cache.put("k", Bytes::from_static(b"first")).await.unwrap();
        cache.put("k", Bytes::from_static(b"second!")).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().unwrap(), Bytes::from_static(b"second!"));
        assert_eq!(cache.total_size().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_locators_are_not_normalized() {
        let (_dir, cache) = cache().await;
        cache.put("https://x/a", Bytes::from_static(b"a")).await.unwrap();

        assert!(cache.get("https://x/a/").await.unwrap().is_none());
        assert!(cache.get("HTTPS://x/a").await.unwrap().is_none());
        assert_ne!(
            FilesystemBlobCache::blob_name("https://x/a"),
            FilesystemBlobCache::blob_name("https://x/a?")
        );
    }

    #[tokio::test]
    async fn test_delete_all_empties_namespace() {
        let (_dir, cache) = cache().await;
        for i in 0..5 {
            cache
                .put(&format!("https://x/{}", i), Bytes::from(vec![0u8; 10]))
                .await
                .unwrap();
        }
        assert_eq!(cache.total_size().await.unwrap(), 50);

        cache.delete_all().await.unwrap();
        assert_eq!(cache.total_size().await.unwrap(), 0);
        assert!(cache.get("https://x/0").await.unwrap().is_none());

        // The namespace stays usable
        cache.put("https://x/0", Bytes::from_static(b"again")).await.unwrap();
        assert!(cache.contains("https://x/0").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_path_points_at_bytes() {
        let (_dir, cache) = cache().await;
        assert!(cache.local_path("https://x/v.mp4").await.unwrap().is_none());

        cache.put("https://x/v.mp4", Bytes::from_static(b"frames")).await.unwrap();
        let path = cache.local_path("https://x/v.mp4").await.unwrap().unwrap();
        assert!(path.starts_with(cache.root()));
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"frames");
    }
}
