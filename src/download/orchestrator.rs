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


//! Download orchestration for offline lessons
//!
//! # Download Flow
//! 1. Fetch the video with progress relayed to the caller (fatal on failure)
//! 2. Cache the video bytes under `video_url`
//! 3. Fetch and cache each subtitle (best-effort)
//! 4. Fetch and cache the thumbnail, if any (best-effort)
//! 5. Commit one `VideoMetadata` record with the accumulated size
//!
//! Steps run strictly in that order, one resource at a time. A record is
//! only written once the video bytes are in the blob cache.
//!
//! # Deletion Order
//! Video blob, subtitle blobs, thumbnail blob, then the metadata record. An
//! interrupted delete leaves a record pointing at missing blobs (repaired by
//! `reconcile`) rather than untracked blobs.
//!
//! # Concurrency
//! Downloads and deletes of the same video id are serialized through an
//! in-flight lock map. Different videos never wait on each other.

use crate::download::fetcher::ProgressiveFetcher;
use crate::download::progress::{format_bytes, DownloadProgress, FetchProgress, ProgressCallback};
use crate::error::{OfflineError, Result};
use crate::storage::blob::BlobCache;
use crate::storage::metadata::MetadataStore;
use crate::storage::models::{video_key, VideoDownloadRequest, VideoMetadata};
use crate::storage::quota::{QuotaProbe, StorageInfo};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Locally addressable handle to a cached resource
///
/// Valid until the underlying blob is evicted (per-video delete, clear-all
/// or reconcile); after that `is_valid` turns false and the path is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMediaHandle {
    /// Remote locator the handle was resolved from
    pub locator: String,

    /// File holding the cached bytes
    pub path: PathBuf,

    /// `file://` URL of `path`, suitable for a media player
    pub url: Url,
}

impl CachedMediaHandle {
    pub async fn is_valid(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

/// Result of checking a record against the blob cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub video_id: i64,

    /// False means the record is stale and `reconcile` would drop it
    pub video_present: bool,

    /// Subtitle/thumbnail locators listed in the record but not cached
    pub missing_auxiliary: Vec<String>,
}

impl VerificationReport {
    pub fn is_complete(&self) -> bool {
        self.video_present && self.missing_auxiliary.is_empty()
    }
}

/// Per-video lock plus the number of operations holding or awaiting it
#[derive(Default)]
struct InFlightSlot {
    lock: Arc<Mutex<()>>,
    users: usize,
}

type InFlightMap = Arc<StdMutex<HashMap<i64, InFlightSlot>>>;

fn lock_map(map: &InFlightMap) -> MutexGuard<'_, HashMap<i64, InFlightSlot>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registration in the in-flight map for one operation on one video
///
/// Dropping it (including when the owning future is dropped while still
/// waiting) releases the lock and removes the map entry once unused.
struct VideoGuard {
    video_id: i64,
    in_flight: InFlightMap,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for VideoGuard {
    fn drop(&mut self) {
        self.held.take();

        let mut in_flight = lock_map(&self.in_flight);
        if let Some(slot) = in_flight.get_mut(&self.video_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                in_flight.remove(&self.video_id);
            }
        }
    }
}

/// Top-level coordinator of the offline stores
#[derive(Clone)]
pub struct DownloadOrchestrator {
    fetcher: ProgressiveFetcher,
    blobs: Arc<dyn BlobCache>,
    metadata: Arc<dyn MetadataStore>,
    quota: QuotaProbe,

    /// Video id -> lock held while that video is downloaded or deleted
    in_flight: InFlightMap,

    serialize_same_video: bool,
}

impl DownloadOrchestrator {
    pub fn new(
        fetcher: ProgressiveFetcher,
        blobs: Arc<dyn BlobCache>,
        metadata: Arc<dyn MetadataStore>,
        quota: QuotaProbe,
    ) -> Self {
        Self {
            fetcher,
            blobs,
            metadata,
            quota,
            in_flight: Arc::new(StdMutex::new(HashMap::new())),
            serialize_same_video: true,
        }
    }

    /// Turn the per-video guard on or off
    ///
    /// With the guard off, concurrent downloads of one video interleave their
    /// blob writes and the last metadata commit wins.
    pub fn with_video_serialization(mut self, enabled: bool) -> Self {
        self.serialize_same_video = enabled;
        self
    }

    pub fn blobs(&self) -> &Arc<dyn BlobCache> {
        &self.blobs
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn quota(&self) -> &QuotaProbe {
        &self.quota
    }

    // ========================================================================
    // DOWNLOAD
    // ========================================================================

    /// Download a lesson and make it available offline
    ///
    /// Resolves once the metadata record is committed. Fails only when the
    /// video itself cannot be fetched or stored; subtitle and thumbnail
    /// failures are logged and skipped.
    pub async fn download_video(
        &self,
        request: VideoDownloadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<()> {
        self.download_with_cancel(request, on_progress, &CancellationToken::new())
            .await
    }

    /// Cancellation-aware variant of `download_video`
    ///
    /// The token is checked at every chunk read and between resources. On
    /// cancel, blobs written by this call are deleted, no record is written
    /// and `Cancelled` is returned. Blobs that an existing record for the
    /// same video refers to are kept, so a cancelled re-download leaves the
    /// earlier download intact.
    pub async fn download_with_cancel(
        &self,
        request: VideoDownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if request.video_url.trim().is_empty() {
            return Err(OfflineError::invalid_input("video_url must not be empty"));
        }

        let video_id = request.video_id;
        let _guard = self.acquire(video_id).await;
        let previous = self.metadata.get(&request.key()).await?;

        let mut written = Vec::new();
        let result = self
            .run_download(request, on_progress, cancel, &mut written)
            .await;

        if matches!(result, Err(OfflineError::Cancelled)) {
            let kept = previous.as_ref().map(|r| r.locators()).unwrap_or_default();
            written.retain(|locator| !kept.contains(&locator.as_str()));
            self.discard(video_id, &written).await;
        }

        result
    }

    async fn run_download(
        &self,
        request: VideoDownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
        written: &mut Vec<String>,
    ) -> Result<()> {
        let video_id = request.video_id;
        info!(video_id, title = %request.title, url = %request.video_url, "download started");

        // 1-2. Primary asset: any failure here aborts the whole download
        let mut relay = on_progress.map(|callback| {
            move |progress: FetchProgress| callback(DownloadProgress::from_fetch(video_id, progress))
        });
        let video = self
            .fetcher
            .fetch_with_cancel(
                &request.video_url,
                relay
                    .as_mut()
                    .map(|f| f as &mut (dyn FnMut(FetchProgress) + Send)),
                cancel,
            )
            .await?;

        let mut total_size = video.len() as u64;
        self.blobs.put(&request.video_url, video).await?;
        written.push(request.video_url.clone());

        // 3. Subtitles, best-effort
        for url in &request.subtitle_urls {
            total_size += self.cache_auxiliary(video_id, url, cancel, written).await?;
        }

        // 4. Thumbnail, best-effort
        if let Some(ref url) = request.thumbnail_url {
            total_size += self.cache_auxiliary(video_id, url, cancel, written).await?;
        }

        if cancel.is_cancelled() {
            return Err(OfflineError::Cancelled);
        }

        // 5. Commit
        let record = request.into_metadata(total_size, Utc::now());
        self.metadata.put(&record).await?;

        info!(video_id, size = total_size, "download completed");
        Ok(())
    }

    /// Fetch and cache one auxiliary asset, returning the bytes it added
    ///
    /// Only cancellation escapes; every other failure counts as zero bytes.
    async fn cache_auxiliary(
        &self,
        video_id: i64,
        url: &str,
        cancel: &CancellationToken,
        written: &mut Vec<String>,
    ) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(OfflineError::Cancelled);
        }

        let outcome = match self.fetcher.fetch_with_cancel(url, None, cancel).await {
            Ok(bytes) => {
                let len = bytes.len() as u64;
                self.blobs.put(url, bytes).await.map(|_| len)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(len) => {
                written.push(url.to_string());
                debug!(video_id, url, bytes = len, "auxiliary asset cached");
                Ok(len)
            }
            Err(OfflineError::Cancelled) => Err(OfflineError::Cancelled),
            Err(e) => {
                let skipped = OfflineError::auxiliary(url, &e);
                warn!(video_id, error = %skipped, "continuing without auxiliary asset");
                Ok(0)
            }
        }
    }

    /// Remove blobs written by a cancelled download
    async fn discard(&self, video_id: i64, written: &[String]) {
        for locator in written {
            if let Err(e) = self.blobs.delete(locator).await {
                warn!(video_id, locator = %locator, error = %e, "failed to discard partial blob");
            }
        }
        info!(video_id, discarded = written.len(), "download cancelled");
    }

    // ========================================================================
    // PER-VIDEO GUARD
    // ========================================================================

    async fn acquire(&self, video_id: i64) -> Option<VideoGuard> {
        if !self.serialize_same_video {
            return None;
        }

        let (lock, mut guard) = {
            let mut in_flight = lock_map(&self.in_flight);
            let slot = in_flight.entry(video_id).or_default();
            slot.users += 1;
            let guard = VideoGuard {
                video_id,
                in_flight: Arc::clone(&self.in_flight),
                held: None,
            };
            (Arc::clone(&slot.lock), guard)
        };

        guard.held = Some(lock.lock_owned().await);
        Some(guard)
    }

    /// Video ids with an operation holding or waiting for the guard
    pub fn in_flight_videos(&self) -> Vec<i64> {
        let in_flight = lock_map(&self.in_flight);
        let mut ids: Vec<i64> = in_flight.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ========================================================================
    // EVICTION
    // ========================================================================

    /// Delete one lesson's blobs and record; absent lessons are a no-op
    pub async fn delete_downloaded_video(&self, video_id: i64) -> Result<()> {
        let _guard = self.acquire(video_id).await;
        self.delete_locked(video_id).await
    }

    async fn delete_locked(&self, video_id: i64) -> Result<()> {
        let key = video_key(video_id);
        let Some(record) = self.metadata.get(&key).await? else {
            debug!(video_id, "delete requested for video that is not downloaded");
            return Ok(());
        };

        self.remove_record(&record).await?;
        info!(video_id, "downloaded video deleted");
        Ok(())
    }

    /// Blobs first, record last
    async fn remove_record(&self, record: &VideoMetadata) -> Result<()> {
        for locator in record.locators() {
            self.blobs.delete(locator).await?;
        }
        self.metadata.delete(&record.id).await
    }

    /// Drop every cached blob, then every record
    pub async fn clear_all_downloads(&self) -> Result<()> {
        self.blobs.delete_all().await?;
        self.metadata.clear().await?;
        info!("all downloads cleared");
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn get_all_downloaded_videos(&self) -> Result<Vec<VideoMetadata>> {
        self.metadata.get_all().await
    }

    pub async fn get_downloaded_video(&self, video_id: i64) -> Result<Option<VideoMetadata>> {
        self.metadata.get(&video_key(video_id)).await
    }

    /// Metadata is the source of truth here; blobs are not consulted
    pub async fn is_video_downloaded(&self, video_id: i64) -> Result<bool> {
        Ok(self.get_downloaded_video(video_id).await?.is_some())
    }

    /// Resolve a locator to a local playback handle
    ///
    /// Cache misses and cache read failures both yield `None`.
    pub async fn get_cached_video_url(&self, video_url: &str) -> Option<CachedMediaHandle> {
        let path = match self.blobs.local_path(video_url).await {
            Ok(Some(path)) => path,
            Ok(None) => return None,
            Err(e) => {
                warn!(url = video_url, error = %e, "cache lookup failed");
                return None;
            }
        };

        let absolute = match std::path::absolute(&path) {
            Ok(absolute) => absolute,
            Err(e) => {
                warn!(url = video_url, error = %e, "cannot resolve cached path");
                return None;
            }
        };

        match Url::from_file_path(&absolute) {
            Ok(url) => Some(CachedMediaHandle {
                locator: video_url.to_string(),
                path: absolute,
                url,
            }),
            Err(()) => {
                warn!(url = video_url, path = %absolute.display(), "cached path is not addressable");
                None
            }
        }
    }

    /// Sum of `size` over all records
    pub async fn get_total_download_size(&self) -> Result<u64> {
        let records = self.metadata.get_all().await?;
        Ok(records.iter().map(|r| r.size).sum())
    }

    pub async fn get_formatted_total_download_size(&self) -> Result<String> {
        Ok(format_bytes(self.get_total_download_size().await?))
    }

    // ========================================================================
    // QUOTA
    // ========================================================================

    pub async fn storage_info(&self) -> StorageInfo {
        self.quota.storage_info().await
    }

    pub async fn has_enough_space(&self, required_bytes: u64) -> bool {
        self.quota.has_enough_space(required_bytes).await
    }

    /// Optional pre-flight for callers; `download_video` never calls this
    pub async fn ensure_space(&self, required_bytes: u64) -> Result<()> {
        let info = self.quota.storage_info().await;
        if info.available >= required_bytes {
            Ok(())
        } else {
            Err(OfflineError::InsufficientSpace {
                need: required_bytes,
                have: info.available,
            })
        }
    }

    // ========================================================================
    // RECONCILIATION
    // ========================================================================

    /// Compare one record with what the blob cache actually holds
    pub async fn verify_downloaded_video(&self, video_id: i64) -> Result<Option<VerificationReport>> {
        let Some(record) = self.get_downloaded_video(video_id).await? else {
            return Ok(None);
        };

        let video_present = self.blobs.contains(&record.video_url).await?;
        let mut missing_auxiliary = Vec::new();
        for locator in record.locators().into_iter().skip(1) {
            if !self.blobs.contains(locator).await? {
                missing_auxiliary.push(locator.to_string());
            }
        }

        Ok(Some(VerificationReport {
            video_id,
            video_present,
            missing_auxiliary,
        }))
    }

    /// Drop records whose video blob is gone, with their remaining blobs
    ///
    /// Returns the ids that were dropped. Missing subtitles or thumbnails
    /// alone never drop a record. Each candidate is checked again under the
    /// per-video guard, so a download that commits meanwhile is left alone.
    pub async fn reconcile(&self) -> Result<Vec<i64>> {
        let mut dropped = Vec::new();

        for candidate in self.metadata.get_all().await? {
            if self.blobs.contains(&candidate.video_url).await? {
                continue;
            }

            let _guard = self.acquire(candidate.video_id).await;
            let Some(record) = self.metadata.get(&candidate.id).await? else {
                continue;
            };
            if self.blobs.contains(&record.video_url).await? {
                debug!(video_id = record.video_id, "record repaired while waiting, keeping it");
                continue;
            }

            self.remove_record(&record).await?;
            warn!(video_id = record.video_id, "dropped record with missing video blob");
            dropped.push(record.video_id);
        }

        Ok(dropped)
    }
}
