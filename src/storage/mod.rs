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


//! Local storage tiers
//!
//! Two independent stores hold an offline lesson:
//! - `BlobCache`: raw bytes of every fetched resource, keyed by locator
//! - `MetadataStore`: one `VideoMetadata` row per lesson (SQLite)
//!
//! They are written one after the other with no shared transaction. The
//! metadata record is the source of truth for "is downloaded"; blobs missing
//! under a valid record are a recoverable inconsistency.
//!
//! # Usage Example
//! ```no_run
//! use offline_lessons::storage::{BlobCache, Database, FilesystemBlobCache, MetadataStore, SqliteMetadataStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./offline/offline.db").await?;
//! let metadata = SqliteMetadataStore::new(&db);
//! let blobs = FilesystemBlobCache::new("./offline/blobs").await?;
//!
//! let record = metadata.get("video-7").await?;
//! let bytes = blobs.get("https://cdn.example.com/v7.mp4").await?;
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod database;
pub mod metadata;
pub mod migrations;
pub mod models;
pub mod quota;

// Re-export commonly used types
pub use blob::{BlobCache, FilesystemBlobCache};
pub use database::Database;
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use models::{video_key, VideoDownloadRequest, VideoMetadata};
pub use quota::{QuotaProbe, StorageInfo};
