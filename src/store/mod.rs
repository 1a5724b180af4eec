//! Storefront protocol codec.
//!
//! Builds sign-in, license-check and purchase requests as XML property lists,
//! sends them through a [`StoreSession`](crate::session::StoreSession), and
//! decodes responses into typed results or a classified [`StoreError`].
//!
//! # Example
//!
//! ```no_run
//! use ipafetch_core::session::StoreSession;
//! use ipafetch_core::store::StoreClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = StoreSession::new()?;
//! let client = StoreClient::new();
//! let response = client
//!     .authenticate(&session, "user@example.com", "password", None)
//!     .await?;
//! println!("signed in as {}", response.dsid);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod item;
mod request;
mod response;
mod storefront;

pub use client::{StoreClient, StoreCredentials};
pub use constants::{
    AUTHENTICATE_URL, CONNECT_TIMEOUT_SECS, DEFAULT_STOREFRONT, DOWNLOAD_URL, HttpTimeouts,
    PURCHASE_URL, READ_TIMEOUT_SECS, StoreEndpoints,
};
pub use error::{ErrorDisposition, LOCKED_FAILURE_TYPES, StoreError, classify_failure_type};
pub use item::{ItemMetadata, Sinf, StoreItem};
pub use response::{AccountInfo, AuthResponse, DownloadResponse, PurchaseResponse};
pub use storefront::{RegionCode, country_for_storefront, normalize_storefront};
