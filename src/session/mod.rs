//! Per-session context shared by every storefront call.
//!
//! A [`StoreSession`] owns the device GUID, the cookie store and the HTTP
//! client that reads and writes it. It is created once at startup and passed
//! explicitly to the codec, the session manager and the orchestrator.
//!
//! Only one identity's cookies can be installed at a time. Callers that act
//! on behalf of an identity hold an [`IdentityGuard`] for the duration of
//! the work; activating another identity waits for the guard to drop.

mod cookies;
mod guid;

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::store::{HttpTimeouts, StoreError};
use crate::user_agent;

pub use cookies::{
    DEFAULT_COOKIE_DOMAIN, SessionCookie, SessionCookies, VENDOR_DOMAIN, parse_cookie_string,
};
pub use guid::{DeviceGuid, GUID_LEN};

/// Construction options for a [`StoreSession`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Connect and read timeouts for storefront requests.
    pub timeouts: HttpTimeouts,
    /// Previously used device GUID to reuse, if any.
    pub device_guid: Option<String>,
}

/// Shared storefront session context.
#[derive(Debug)]
pub struct StoreSession {
    http: Client,
    cookies: Arc<SessionCookies>,
    guid: DeviceGuid,
    identity: Mutex<()>,
}

/// Proof that the caller holds the session's identity slot.
#[derive(Debug)]
#[must_use = "the identity slot is released when the guard is dropped"]
pub struct IdentityGuard<'a> {
    _slot: MutexGuard<'a, ()>,
}

impl StoreSession {
    /// Creates a session with default timeouts and a fresh device GUID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, StoreError> {
        Self::with_options(SessionOptions::default())
    }

    /// Creates a session from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Network`] if the HTTP client cannot be built.
    pub fn with_options(options: SessionOptions) -> Result<Self, StoreError> {
        let cookies = Arc::new(SessionCookies::new());
        let http = Client::builder()
            .user_agent(user_agent::STOREFRONT_CLIENT_IDENTIFIER)
            .connect_timeout(options.timeouts.connect)
            .read_timeout(options.timeouts.read)
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(|error| StoreError::network("client builder", error))?;

        let guid = options
            .device_guid
            .as_deref()
            .map_or_else(DeviceGuid::new, DeviceGuid::with_seed);
        debug!("storefront session created");

        Ok(Self {
            http,
            cookies,
            guid,
            identity: Mutex::new(()),
        })
    }

    /// Device GUID sent with every request of this session.
    pub fn guid(&self) -> &str {
        self.guid.get()
    }

    /// The live cookie store.
    #[must_use]
    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Waits for the identity slot without touching installed cookies.
    pub async fn lock_identity(&self) -> IdentityGuard<'_> {
        IdentityGuard {
            _slot: self.identity.lock().await,
        }
    }

    /// Waits for the identity slot, then replaces the vendor cookies with
    /// `cookie_strings`.
    pub async fn activate(&self, cookie_strings: &[String]) -> IdentityGuard<'_> {
        let guard = self.lock_identity().await;
        let installed = self.cookies.replace_vendor(cookie_strings);
        debug!(installed, "activated identity cookies");
        guard
    }
}
