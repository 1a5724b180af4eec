//! Storefront transport: serializes requests, POSTs them through the session
//! client, and hands bodies to the typed parsers.

use plist::Dictionary;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::{debug, instrument};

use super::constants::{
    DEFAULT_STOREFRONT, HEADER_DSID, HEADER_ICLOUD_DSID, HEADER_STORE_FRONT, HEADER_TOKEN,
    PLIST_CONTENT_TYPE, STOREFRONT_RESPONSE_HEADERS, StoreEndpoints,
};
use super::error::StoreError;
use super::request::{authenticate_body, download_body, encode_body, purchase_body};
use super::response::{
    AuthResponse, DownloadResponse, PurchaseResponse, parse_authenticate, parse_download,
    parse_purchase,
};
use super::storefront::normalize_storefront;
use crate::session::StoreSession;

/// Credentials attached to every authenticated storefront request.
#[derive(Clone, Copy)]
pub struct StoreCredentials<'a> {
    /// Directory-services id.
    pub dsid: &'a str,
    /// Session credential from sign-in.
    pub password_token: &'a str,
    /// Raw storefront value; normalized before sending.
    pub storefront: &'a str,
}

impl std::fmt::Debug for StoreCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("dsid", &self.dsid)
            .field("password_token", &"[REDACTED]")
            .field("storefront", &self.storefront)
            .finish()
    }
}

struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Storefront protocol codec.
///
/// Stateless apart from the endpoint configuration; all session state lives
/// in the [`StoreSession`] passed to each call.
#[derive(Debug, Clone, Default)]
pub struct StoreClient {
    endpoints: StoreEndpoints,
}

impl StoreClient {
    /// Creates a client for the production endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client for explicit endpoints.
    #[must_use]
    pub fn with_endpoints(endpoints: StoreEndpoints) -> Self {
        Self { endpoints }
    }

    /// The configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &StoreEndpoints {
        &self.endpoints
    }

    /// Signs in. `code` is the optional second-factor verification code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CodeRequired`] when a verification code is
    /// needed, [`StoreError::LockedAccount`] for disabled accounts, and the
    /// classified storefront failure otherwise.
    #[instrument(skip(self, session, password, code), fields(email = %email, with_code = code.is_some()))]
    pub async fn authenticate(
        &self,
        session: &StoreSession,
        email: &str,
        password: &str,
        code: Option<&str>,
    ) -> Result<AuthResponse, StoreError> {
        let guid = session.guid();
        let body = authenticate_body(email, password, code, guid);
        let url = self.endpoints.authenticate_url(guid);
        let response = self.post(session, &url, body, None).await?;
        let header_storefront = storefront_from_headers(&response.headers);
        parse_authenticate(
            response.status,
            header_storefront,
            DEFAULT_STOREFRONT,
            &response.body,
        )
    }

    /// Checks the license for `catalog_id` and returns artifact descriptors.
    ///
    /// `version_id` selects a historical build; `None` means latest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidLicense`] when the identity holds no
    /// license for the item.
    #[instrument(skip(self, session, credentials), fields(catalog_id = %catalog_id))]
    pub async fn check_license_and_download(
        &self,
        session: &StoreSession,
        credentials: &StoreCredentials<'_>,
        catalog_id: &str,
        version_id: Option<&str>,
    ) -> Result<DownloadResponse, StoreError> {
        let guid = session.guid();
        let body = download_body(guid, catalog_id, version_id);
        let url = self.endpoints.download_url(guid);
        let response = self.post(session, &url, body, Some(credentials)).await?;
        parse_download(response.status, &response.body)
    }

    /// Acquires a free license for `catalog_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserInteractionRequired`] when the storefront
    /// answers with a dialog instead of completing the purchase.
    #[instrument(skip(self, session, credentials), fields(catalog_id = %catalog_id))]
    pub async fn purchase(
        &self,
        session: &StoreSession,
        credentials: &StoreCredentials<'_>,
        catalog_id: &str,
    ) -> Result<PurchaseResponse, StoreError> {
        let body = purchase_body(
            session.guid(),
            catalog_id,
            credentials.dsid,
            credentials.password_token,
        );
        let response = self
            .post(session, &self.endpoints.purchase, body, Some(credentials))
            .await?;
        parse_purchase(response.status, &response.body)
    }

    async fn post(
        &self,
        session: &StoreSession,
        url: &str,
        body: Dictionary,
        credentials: Option<&StoreCredentials<'_>>,
    ) -> Result<RawResponse, StoreError> {
        let payload = encode_body(body)?;
        let mut request = session
            .http()
            .post(url)
            .header(CONTENT_TYPE, PLIST_CONTENT_TYPE)
            .body(payload);

        if let Some(credentials) = credentials {
            request = request
                .header(HEADER_DSID, credentials.dsid)
                .header(HEADER_ICLOUD_DSID, credentials.dsid)
                .header(HEADER_TOKEN, credentials.password_token);
            let storefront = normalize_storefront(credentials.storefront);
            if !storefront.is_empty() {
                request = request.header(HEADER_STORE_FRONT, storefront);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|error| StoreError::network(url, error))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|error| StoreError::network(url, error))?;
        debug!(status, bytes = body.len(), "storefront response received");

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn storefront_from_headers(headers: &HeaderMap) -> Option<String> {
    STOREFRONT_RESPONSE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    })
}
