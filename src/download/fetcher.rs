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


//! Progressive HTTP retrieval into memory
//!
//! # Key Features
//! - One GET per resource, body accumulated into a single `Bytes`
//! - Progress after every chunk when the server sends `Content-Length`
//! - Non-success status fails with `NetworkFetch` carrying the status code
//! - Cancellation checked while waiting for each chunk
//!
//! # Progress Rules
//! 1. No callback, or no `Content-Length`: the body is still read fully but
//!    nothing is reported
//! 2. Otherwise the callback fires once per chunk with a non-decreasing
//!    percentage, and the last call reports 100
//! 3. A body shorter than the announced length is an error

use crate::config::OfflineConfig;
use crate::download::progress::FetchProgress;
use crate::error::{OfflineError, Result};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound on the up-front buffer reservation taken from `Content-Length`
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Progress sink borrowed for the duration of one fetch
pub type FetchProgressFn<'a> = &'a mut (dyn FnMut(FetchProgress) + Send);

/// HTTP fetcher that reassembles a response into memory
#[derive(Debug, Clone)]
pub struct ProgressiveFetcher {
    client: Client,
}

impl ProgressiveFetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_config(config: &OfflineConfig) -> Result<Self> {
        Self::new(config.request_timeout(), &config.user_agent)
    }

    /// Fetch a resource, optionally reporting byte progress
    pub async fn fetch(&self, url: &str, on_progress: Option<FetchProgressFn<'_>>) -> Result<Bytes> {
        self.fetch_with_cancel(url, on_progress, &CancellationToken::new())
            .await
    }

    /// Fetch a resource, aborting with `Cancelled` once `cancel` fires
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        on_progress: Option<FetchProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let parsed = url::Url::parse(url)?;
        if cancel.is_cancelled() {
            return Err(OfflineError::Cancelled);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OfflineError::Cancelled),
            sent = self.client.get(parsed).send() => sent.map_err(|e| transport_error(url, e))?,
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "fetch rejected");
            return Err(OfflineError::NetworkFetch {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        debug!(url, content_length = ?total, "fetch started");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| transport_error(url, e)));

        let body = collect_with_progress(stream, total, on_progress, cancel).await?;
        debug!(url, bytes = body.len(), "fetch finished");
        Ok(body)
    }
}

/// Accumulate a chunk stream into one buffer, reporting progress per chunk
///
/// `total` is the announced length; progress is only reported when it is
/// known and a callback is present.
pub async fn collect_with_progress<S>(
    stream: S,
    total: Option<u64>,
    mut on_progress: Option<FetchProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<Bytes>
where
    S: Stream<Item = Result<Bytes>>,
{
    futures_util::pin_mut!(stream);
    let capacity = total.unwrap_or(0).min(MAX_PREALLOC) as usize;
    let mut buffer = BytesMut::with_capacity(capacity);
    let mut loaded: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OfflineError::Cancelled),
            next = stream.next() => next,
        };

        let chunk = match next {
            Some(chunk) => chunk?,
            None => break,
        };

        loaded += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);

        if let (Some(total), Some(callback)) = (total, on_progress.as_deref_mut()) {
            callback(FetchProgress::new(loaded, total));
        }
    }

    if let Some(total) = total {
        if loaded < total {
            return Err(OfflineError::network_error(
                format!("Download incomplete: {}/{} bytes", loaded, total),
                true,
            ));
        }
    }

    Ok(buffer.freeze())
}

fn transport_error(url: &str, error: reqwest::Error) -> OfflineError {
    if let Some(status) = error.status() {
        return OfflineError::NetworkFetch {
            status: status.as_u16(),
            url: url.to_string(),
        };
    }
    OfflineError::network_error(
        format!("{}: {}", url, error),
        error.is_timeout() || error.is_connect() || error.is_body(),
    )
}
