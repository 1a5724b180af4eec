//! Streaming artifact downloader.
//!
//! Artifacts are hundreds of megabytes; bodies are streamed chunk by chunk
//! through a fixed-size write buffer and never held in memory whole.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{PROGRESS_INTERVAL, STREAM_BUFFER_BYTES};
use super::error::DownloadError;
use super::progress::{DownloadProgress, ProgressTracker};
use crate::store::HttpTimeouts;
use crate::user_agent;

/// Callback receiving progress reports during a transfer.
pub type ProgressCallback = dyn Fn(&DownloadProgress) + Send + Sync;

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Where the artifact was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes_downloaded: u64,
    /// Advertised content length, when the server sent one.
    pub content_length: Option<u64>,
}

/// Streams artifact URLs to local files with progress reporting.
///
/// Create once and reuse; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    client: Client,
    progress_interval: Duration,
}

impl ArtifactDownloader {
    /// Creates a downloader with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates a downloader with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(user_agent::default_tool_user_agent())
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .no_gzip()
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Overrides the minimum spacing between progress reports.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Streams `url` to `destination`, creating parent directories.
    ///
    /// `on_progress` is called at most once per progress interval and once
    /// more on completion with a 100% report. A body shorter or longer than
    /// the advertised content length is an integrity failure.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, non-200 responses,
    /// transport failures, IO failures and length mismatches.
    #[must_use = "download outcome carries the written path and size"]
    #[instrument(skip(self, on_progress), fields(url = %url, path = %destination.display()))]
    pub async fn stream(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<DownloadOutcome, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|error| DownloadError::network(url, error))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        let content_length = response.content_length();
        debug!(?content_length, "artifact response accepted");

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| DownloadError::io(parent, error))?;
        }
        let file = File::create(destination)
            .await
            .map_err(|error| DownloadError::io(destination, error))?;
        let mut writer = BufWriter::with_capacity(STREAM_BUFFER_BYTES, file);

        let mut tracker = ProgressTracker::new(content_length, self.progress_interval, Instant::now());
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|error| DownloadError::network(url, error))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|error| DownloadError::io(destination, error))?;
            if let Some(report) = tracker.record(chunk.len() as u64, Instant::now())
                && let Some(callback) = on_progress
            {
                callback(&report);
            }
        }

        writer
            .flush()
            .await
            .map_err(|error| DownloadError::io(destination, error))?;

        let bytes_downloaded = tracker.downloaded();
        if let Some(expected) = content_length
            && expected != bytes_downloaded
        {
            return Err(DownloadError::integrity(destination, expected, bytes_downloaded));
        }

        if let Some(callback) = on_progress {
            callback(&tracker.finish(Instant::now()));
        }
        info!(bytes = bytes_downloaded, "artifact downloaded");

        Ok(DownloadOutcome {
            path: destination.to_path_buf(),
            bytes_downloaded,
            content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stream_invalid_url() {
        let tempdir = TempDir::new().unwrap();
        let downloader = ArtifactDownloader::new().unwrap();
        let result = tokio_test::block_on(downloader.stream(
            "not a url",
            &tempdir.path().join("x.ipa"),
            None,
        ));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
