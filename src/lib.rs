//! Offline lesson sync engine
//!
//! Downloads a lesson video plus its subtitles and thumbnail, keeps the bytes
//! in a locator-keyed blob cache and a metadata record in SQLite, and serves
//! playback handles, listings and eviction from those two stores.
//!
//! ```no_run
//! use offline_lessons::{OfflineConfig, OfflineContext, VideoDownloadRequest};
//!
//! # async fn example() -> offline_lessons::Result<()> {
//! let context = OfflineContext::open(OfflineConfig::from_env()?).await?;
//! let orchestrator = context.orchestrator();
//!
//! let request = VideoDownloadRequest::new(7, "Intro", "https://cdn.example.com/v7.mp4")
//!     .with_subtitles(["https://cdn.example.com/v7.en.vtt"]);
//! orchestrator.download_video(request, None).await?;
//!
//! if let Some(handle) = orchestrator.get_cached_video_url("https://cdn.example.com/v7.mp4").await {
//!     println!("play {}", handle.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::OfflineConfig;
pub use context::OfflineContext;
pub use download::{
    format_bytes, CachedMediaHandle, DownloadOrchestrator, DownloadProgress, ProgressCallback,
    ProgressiveFetcher, VerificationReport,
};
pub use error::{OfflineError, Result};
pub use storage::{StorageInfo, VideoDownloadRequest, VideoMetadata};
