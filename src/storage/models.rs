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


//! Persisted record types
//!
//! One `VideoMetadata` row per cached lesson. The URLs double as keys into
//! the blob cache; the two stores are otherwise independent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the synthetic metadata key
pub const VIDEO_KEY_PREFIX: &str = "video-";

/// Build the metadata key for a catalog video id (`video-<id>`)
pub fn video_key(video_id: i64) -> String {
    format!("{}{}", VIDEO_KEY_PREFIX, video_id)
}

/// Summary record of one downloaded lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Primary key, always `video-<video_id>`
    pub id: String,

    /// Remote catalog identifier
    pub video_id: i64,

    /// Title as it was when downloaded
    pub title: String,

    pub video_url: String,

    pub thumbnail_url: Option<String>,

    /// Every requested subtitle locator, including ones that failed to fetch
    pub subtitle_urls: Vec<String>,

    /// Bytes across all resources that were actually cached
    pub size: u64,

    pub downloaded_at: DateTime<Utc>,
}

impl VideoMetadata {
    /// All blob locators this record refers to, video first
    pub fn locators(&self) -> Vec<&str> {
        let mut locators = Vec::with_capacity(self.subtitle_urls.len() + 2);
        locators.push(self.video_url.as_str());
        locators.extend(self.subtitle_urls.iter().map(String::as_str));
        if let Some(ref thumbnail) = self.thumbnail_url {
            locators.push(thumbnail.as_str());
        }
        locators
    }
}

/// Everything the caller knows about a lesson before downloading it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDownloadRequest {
    pub video_id: i64,
    pub title: String,
    pub video_url: String,
    #[serde(default)]
    pub subtitle_urls: Vec<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl VideoDownloadRequest {
    pub fn new<T: Into<String>, U: Into<String>>(video_id: i64, title: T, video_url: U) -> Self {
        Self {
            video_id,
            title: title.into(),
            video_url: video_url.into(),
            subtitle_urls: Vec::new(),
            thumbnail_url: None,
        }
    }

    pub fn with_subtitles<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subtitle_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_thumbnail<S: Into<String>>(mut self, url: S) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn key(&self) -> String {
        video_key(self.video_id)
    }

    /// Turn the request into the record committed after a download
    pub fn into_metadata(self, size: u64, downloaded_at: DateTime<Utc>) -> VideoMetadata {
        VideoMetadata {
            id: video_key(self.video_id),
            video_id: self.video_id,
            title: self.title,
            video_url: self.video_url,
            thumbnail_url: self.thumbnail_url,
            subtitle_urls: self.subtitle_urls,
            size,
            downloaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_key() {
        assert_eq!(video_key(7), "video-7");
        assert_eq!(VideoDownloadRequest::new(42, "t", "https://x/v").key(), "video-42");
    }

    #[test]
    fn test_locators_order() {
        let record = VideoDownloadRequest::new(7, "Lesson 7", "https://x/v7.mp4")
            .with_subtitles(["https://x/v7.en.vtt", "https://x/v7.de.vtt"])
            .with_thumbnail("https://x/v7.jpg")
            .into_metadata(10, Utc::now());

        assert_eq!(
            record.locators(),
            vec![
                "https://x/v7.mp4",
                "https://x/v7.en.vtt",
                "https://x/v7.de.vtt",
                "https://x/v7.jpg"
            ]
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let record = VideoDownloadRequest::new(7, "Lesson 7", "https://x/v7.mp4").into_metadata(1, Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["videoId"], 7);
        assert_eq!(json["videoUrl"], "https://x/v7.mp4");
        assert!(json["thumbnailUrl"].is_null());
    }
}
