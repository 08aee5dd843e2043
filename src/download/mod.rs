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


//! Download pipeline
//!
//! - `fetcher`: progressive HTTP retrieval of one resource into memory
//! - `orchestrator`: multi-resource download, eviction and queries over the
//!   blob cache and metadata store
//! - `progress`: progress snapshots and byte formatting

pub mod fetcher;
pub mod orchestrator;
pub mod progress;

// Re-export commonly used types
pub use fetcher::ProgressiveFetcher;
pub use orchestrator::{CachedMediaHandle, DownloadOrchestrator, VerificationReport};
pub use progress::{format_bytes, DownloadProgress, FetchProgress, ProgressCallback};
