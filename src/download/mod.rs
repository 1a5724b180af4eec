//! Artifact transfer: streams signed artifact URLs to disk with progress.
//!
//! # Example
//!
//! ```no_run
//! use ipafetch_core::download::{ArtifactDownloader, DownloadProgress, ProgressCallback};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = ArtifactDownloader::new()?;
//! let print: &ProgressCallback =
//!     &|progress: &DownloadProgress| println!("{}", progress.summary());
//! let outcome = downloader
//!     .stream("https://cdn.example.com/app.ipa", Path::new("app.ipa"), Some(print))
//!     .await?;
//! println!("wrote {} bytes", outcome.bytes_downloaded);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod filename;
mod progress;

pub use client::{ArtifactDownloader, DownloadOutcome, ProgressCallback};
pub use constants::{PROGRESS_INTERVAL, STREAM_BUFFER_BYTES};
pub use error::DownloadError;
pub use filename::{artifact_file_name, resolve_output_path};
pub use progress::{DownloadProgress, format_bytes, format_duration};
