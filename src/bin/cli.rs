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


use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offline_lessons::storage::BlobCache;
use offline_lessons::{
    format_bytes, logging, DownloadProgress, OfflineConfig, OfflineContext, OfflineError,
    ProgressCallback, VideoDownloadRequest,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "offline-lessons")]
#[command(about = "Offline Lessons CLI - manage downloaded lessons", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and environment)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a lesson for offline use
    Download {
        /// Catalog video id
        video_id: i64,
        /// Lesson title
        title: String,
        /// Video URL
        video_url: String,
        /// Subtitle URL (repeatable)
        #[arg(short, long = "subtitle")]
        subtitles: Vec<String>,
        /// Thumbnail URL
        #[arg(short, long)]
        thumbnail: Option<String>,
    },
    /// List downloaded lessons, newest first
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one downloaded lesson and its cache state
    Show {
        video_id: i64,
    },
    /// Delete one downloaded lesson
    Delete {
        video_id: i64,
    },
    /// Delete every downloaded lesson
    Clear,
    /// Print total size of downloaded lessons
    Size,
    /// Print storage usage and quota
    Quota,
    /// Drop records whose video is no longer cached
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(logging::DEFAULT_FILTER)?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => OfflineConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => OfflineConfig::from_env()?,
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let context = OfflineContext::open(config).await.context("opening offline store")?;
    let result = run(&context, cli.command).await;
    context.close().await?;
    result
}

async fn run(context: &OfflineContext, command: Commands) -> Result<()> {
    let orchestrator = context.orchestrator();

    match command {
        Commands::Download {
            video_id,
            title,
            video_url,
            subtitles,
            thumbnail,
        } => {
            let mut request = VideoDownloadRequest::new(video_id, title, video_url).with_subtitles(subtitles);
            if let Some(url) = thumbnail {
                request = request.with_thumbnail(url);
            }

            let on_progress: ProgressCallback = Arc::new(|progress: DownloadProgress| {
                print!("\r⬇️  {}", progress.display_string());
                let _ = std::io::stdout().flush();
            });

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            match orchestrator
                .download_with_cancel(request, Some(on_progress), &cancel)
                .await
            {
                Ok(()) => println!("\n✅ Downloaded video {}", video_id),
                Err(OfflineError::Cancelled) => println!("\n⚠️  Download cancelled"),
                Err(e) => {
                    println!();
                    return Err(e).context(format!("downloading video {}", video_id));
                }
            }
        }
        Commands::List { json } => {
            let videos = orchestrator.get_all_downloaded_videos().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&videos)?);
            } else if videos.is_empty() {
                println!("No downloaded lessons");
            } else {
                for video in videos {
                    println!(
                        "{:>8}  {:>10}  {}  {}",
                        video.video_id,
                        format_bytes(video.size),
                        video.downloaded_at.format("%Y-%m-%d %H:%M"),
                        video.title
                    );
                }
            }
        }
        Commands::Show { video_id } => {
            let Some(video) = orchestrator.get_downloaded_video(video_id).await? else {
                println!("Video {} is not downloaded", video_id);
                return Ok(());
            };
            println!("{}", serde_json::to_string_pretty(&video)?);

            if let Some(handle) = orchestrator.get_cached_video_url(&video.video_url).await {
                println!("Playback: {}", handle.url);
            }
            if let Some(report) = orchestrator.verify_downloaded_video(video_id).await? {
                if !report.is_complete() {
                    println!("⚠️  Cache incomplete: {}", serde_json::to_string(&report)?);
                }
            }
        }
        Commands::Delete { video_id } => {
            orchestrator.delete_downloaded_video(video_id).await?;
            println!("Deleted video {}", video_id);
        }
        Commands::Clear => {
            orchestrator.clear_all_downloads().await?;
            println!("Cleared all downloads");
        }
        Commands::Size => {
            println!("{}", orchestrator.get_formatted_total_download_size().await?);
        }
        Commands::Quota => {
            let info = orchestrator.storage_info().await;
            if info.is_known() {
                println!(
                    "Used {} of {} ({:.1}%), {} available",
                    format_bytes(info.usage),
                    format_bytes(info.quota),
                    info.usage_percent,
                    format_bytes(info.available)
                );
            } else {
                println!("Storage estimate unavailable");
            }
            println!("Blob cache: {}", format_bytes(orchestrator.blobs().total_size().await?));
            println!("Metadata database: {}", format_bytes(context.database().get_size().await?));
        }
        Commands::Reconcile => {
            let dropped = orchestrator.reconcile().await?;
            println!("Dropped {} stale record(s): {:?}", dropped.len(), dropped);
        }
    }

    Ok(())
}
