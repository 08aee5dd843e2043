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


//! Download progress tracking and reporting
//!
//! # Progress Information
//! - Video identifier (only the primary asset reports progress)
//! - Bytes received / total bytes from `Content-Length`
//! - Whole-number percentage, rounded, never above 100
//!
//! Progress is transient and never persisted.

use serde::{Deserialize, Serialize};

/// Byte-level progress of a single fetch, before it is tied to a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchProgress {
    /// Bytes received so far
    pub loaded: u64,

    /// Total bytes announced by the server
    pub total: u64,

    /// `round(loaded / total * 100)`, clamped to 100
    pub percent: u8,
}

impl FetchProgress {
    /// Build a snapshot and compute its percentage
    pub fn new(loaded: u64, total: u64) -> Self {
        Self {
            loaded,
            total,
            percent: Self::calculate_percentage(loaded, total),
        }
    }

    /// Calculate rounded percentage from bytes
    pub fn calculate_percentage(loaded: u64, total: u64) -> u8 {
        if total == 0 {
            return 0;
        }
        let percent = (loaded as f64 / total as f64 * 100.0).round();
        percent.min(100.0) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }
}

/// Progress snapshot for a lesson download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Remote catalog identifier of the video
    pub video_id: i64,

    /// Bytes downloaded so far
    pub loaded: u64,

    /// Total bytes to download
    pub total: u64,

    /// Percentage complete (0 - 100)
    pub percent: u8,
}

impl DownloadProgress {
    pub fn from_fetch(video_id: i64, progress: FetchProgress) -> Self {
        Self {
            video_id,
            loaded: progress.loaded,
            total: progress.total,
            percent: progress.percent,
        }
    }

    /// Format progress as display string (e.g., "42% (1.2 MB / 2.9 MB)")
    pub fn display_string(&self) -> String {
        format!(
            "{}% ({} / {})",
            self.percent,
            format_bytes(self.loaded),
            format_bytes(self.total)
        )
    }
}

/// Callback type for lesson progress updates
pub type ProgressCallback = std::sync::Arc<dyn Fn(DownloadProgress) + Send + Sync>;

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Format bytes as human-readable string using base-1024 units
///
/// Two decimals with trailing zeros trimmed: `0 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut exponent = 0;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        assert_eq!(FetchProgress::new(250, 1000).percent, 25);
        assert_eq!(FetchProgress::new(1000, 1000).percent, 100);
        assert_eq!(FetchProgress::new(1, 3).percent, 33);
        assert_eq!(FetchProgress::new(2, 3).percent, 67);
        assert_eq!(FetchProgress::new(10, 0).percent, 0);
    }

    #[test]
    fn test_percentage_clamped_when_server_undercounts() {
        let progress = FetchProgress::new(1500, 1000);
        assert_eq!(progress.percent, 100);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_048_576), "1 MB");
        assert_eq!(format_bytes(1_007_000), "983.4 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn test_display_string() {
        let progress = DownloadProgress::from_fetch(7, FetchProgress::new(512, 1024));
        assert_eq!(progress.video_id, 7);
        assert_eq!(progress.display_string(), "50% (512 Bytes / 1 KB)");
    }
}
