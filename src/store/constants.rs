//! Storefront protocol constants and endpoint configuration.

use std::time::Duration;

/// Content type for every storefront request body.
pub const PLIST_CONTENT_TYPE: &str = "application/x-apple-plist";

/// Production sign-in endpoint.
pub const AUTHENTICATE_URL: &str = "https://auth.itunes.apple.com/auth/v1/native/fast";

/// Production license-check / download-descriptor endpoint.
pub const DOWNLOAD_URL: &str =
    "https://p25-buy.itunes.apple.com/WebObjects/MZFinance.woa/wa/volumeStoreDownloadProduct";

/// Production purchase endpoint.
pub const PURCHASE_URL: &str = "https://buy.itunes.apple.com/WebObjects/MZFinance.woa/wa/buyProduct";

const AUTHENTICATE_PATH: &str = "/auth/v1/native/fast";
const DOWNLOAD_PATH: &str = "/WebObjects/MZFinance.woa/wa/volumeStoreDownloadProduct";
const PURCHASE_PATH: &str = "/WebObjects/MZFinance.woa/wa/buyProduct";

/// Storefront used when the sign-in response carries none.
pub const DEFAULT_STOREFRONT: &str = "143441-1,29";

/// Response headers that carry the storefront, in lookup order.
pub const STOREFRONT_RESPONSE_HEADERS: &[&str] = &["x-set-apple-store-front", "x-apple-store-front"];

/// Request header carrying the account DSID.
pub const HEADER_DSID: &str = "X-Dsid";

/// Secondary request header carrying the account DSID.
pub const HEADER_ICLOUD_DSID: &str = "iCloud-DSID";

/// Request header carrying the password token.
pub const HEADER_TOKEN: &str = "X-Token";

/// Request header carrying the normalized storefront.
pub const HEADER_STORE_FRONT: &str = "X-Apple-Store-Front";

/// Customer message that signals a second factor is required.
pub const CODE_REQUIRED_MESSAGE_KEY: &str = "MZFinance.BadLogin.Configurator_message";

/// Message fragment that signals a second factor is required.
pub const CODE_REQUIRED_MESSAGE_FRAGMENT: &str = "verification code is required";

/// Top-level keys searched for the DSID, in priority order.
pub const DSID_KEYS: &[&str] = &[
    "dsPersonId",
    "dsPersonID",
    "dsid",
    "DSID",
    "directoryServicesIdentifier",
];

/// Connect timeout for storefront requests.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for storefront requests and artifact transfers.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Base URLs of the three storefront endpoints.
///
/// Production values by default; tests point every endpoint at a mock server
/// with [`StoreEndpoints::rooted_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEndpoints {
    /// Sign-in endpoint (without query).
    pub authenticate: String,
    /// License-check / download-descriptor endpoint (without query).
    pub download: String,
    /// Purchase endpoint.
    pub purchase: String,
}

impl Default for StoreEndpoints {
    fn default() -> Self {
        Self {
            authenticate: AUTHENTICATE_URL.to_string(),
            download: DOWNLOAD_URL.to_string(),
            purchase: PURCHASE_URL.to_string(),
        }
    }
}

impl StoreEndpoints {
    /// Builds endpoints that share one base URL, keeping the production paths.
    #[must_use]
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authenticate: format!("{base}{AUTHENTICATE_PATH}"),
            download: format!("{base}{DOWNLOAD_PATH}"),
            purchase: format!("{base}{PURCHASE_PATH}"),
        }
    }

    pub(crate) fn authenticate_url(&self, guid: &str) -> String {
        format!("{}?guid={guid}", self.authenticate)
    }

    pub(crate) fn download_url(&self, guid: &str) -> String {
        format!("{}?guid={guid}", self.download)
    }
}

/// Connect and read timeouts for storefront and artifact requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Per-read inactivity timeout.
    pub read: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}
