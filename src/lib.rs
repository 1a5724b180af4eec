//! ipafetch Core Library
//!
//! This library implements the acquisition pipeline for storefront app
//! packages: sign-in with verification-code handling, the plist wire
//! protocol, license check and purchase, streamed artifact download, and the
//! metadata rewrite that makes a package installable.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`session`] - Per-process session context: device GUID, cookies, identity slot
//! - [`store`] - Storefront protocol codec and error taxonomy
//! - [`auth`] - Sign-in, retry policy and identity persistence
//! - [`download`] - Streaming artifact downloader with progress reporting
//! - [`package`] - `iTunesMetadata.plist` injection
//! - [`acquire`] - License check → purchase → download → repackage
//! - [`catalog`] - Bundle id lookup and version history

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acquire;
pub mod auth;
pub mod catalog;
pub mod download;
pub mod package;
pub mod session;
pub mod store;
mod user_agent;

// Re-export commonly used types
pub use acquire::{AcquireError, AcquireRequest, AcquiredArtifact, Acquirer, AcquisitionStage};
pub use auth::{Account, AuthRetryPolicy, CredentialStore, SessionManager};
pub use catalog::{AppVersion, CatalogLookup, ItunesLookup, VersionHistory};
pub use download::{ArtifactDownloader, DownloadError, DownloadProgress, ProgressCallback};
pub use package::{PackageError, PackageMetadata, repackage};
pub use session::{SessionOptions, StoreSession};
pub use store::{ErrorDisposition, StoreClient, StoreEndpoints, StoreError, StoreItem};
