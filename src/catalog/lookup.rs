//! Bundle identifier → catalog id resolution through the public lookup API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::CATALOG_TIMEOUT;
use crate::store::StoreError;
use crate::user_agent::default_tool_user_agent;

/// Default lookup API base URL.
const DEFAULT_BASE_URL: &str = "https://itunes.apple.com";

/// A catalog entry resolved from a bundle identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Numeric catalog id, as a decimal string.
    pub catalog_id: String,
    /// Bundle identifier echoed by the catalog.
    pub bundle_id: String,
    /// Listing name.
    pub name: Option<String>,
    /// Current marketing version.
    pub version: Option<String>,
}

/// Resolves bundle identifiers to catalog ids.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Looks up `bundle_id` in the storefront of `country` (ISO code).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidItem`] when the catalog has no match.
    async fn lookup(&self, bundle_id: &str, country: &str) -> Result<CatalogEntry, StoreError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult {
    track_id: Option<u64>,
    bundle_id: Option<String>,
    track_name: Option<String>,
    version: Option<String>,
}

/// [`CatalogLookup`] backed by the public iTunes lookup endpoint.
#[derive(Debug, Clone)]
pub struct ItunesLookup {
    client: Client,
    base_url: String,
}

impl ItunesLookup {
    /// Creates a lookup against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a lookup against a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Network`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(default_tool_user_agent())
            .timeout(CATALOG_TIMEOUT)
            .build()
            .map_err(|error| StoreError::network("client builder", error))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, bundle_id: &str, country: &str) -> Result<Url, StoreError> {
        let country = country.trim().to_ascii_lowercase();
        Url::parse_with_params(
            &format!("{}/lookup", self.base_url),
            &[
                ("bundleId", bundle_id.trim()),
                ("country", country.as_str()),
                ("entity", "software"),
            ],
        )
        .map_err(|error| StoreError::invalid_response(format!("invalid lookup URL: {error}")))
    }
}

#[async_trait]
impl CatalogLookup for ItunesLookup {
    #[instrument(skip(self))]
    async fn lookup(&self, bundle_id: &str, country: &str) -> Result<CatalogEntry, StoreError> {
        let url = self.lookup_url(bundle_id, country)?;
        let endpoint = url.to_string();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| StoreError::network(&endpoint, error))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Server {
                status: status.as_u16(),
            });
        }

        let body: LookupResponse = response.json().await.map_err(|error| {
            StoreError::invalid_response(format!("lookup response was not valid JSON: {error}"))
        })?;
        debug!(results = body.results.len(), "lookup response parsed");

        body.results
            .into_iter()
            .find_map(|result| {
                let track_id = result.track_id?;
                Some(CatalogEntry {
                    catalog_id: track_id.to_string(),
                    bundle_id: result.bundle_id.unwrap_or_else(|| bundle_id.to_string()),
                    name: result.track_name,
                    version: result.version,
                })
            })
            .ok_or_else(|| StoreError::invalid_item(format!("no catalog entry for {bundle_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_url_carries_query() {
        let lookup = ItunesLookup::with_base_url("http://localhost:9/").unwrap();
        let url = lookup.lookup_url("com.example.notes", "US").unwrap();
        assert_eq!(url.path(), "/lookup");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        assert!(pairs.contains(&("bundleId".to_string(), "com.example.notes".to_string())));
        assert!(pairs.contains(&("country".to_string(), "us".to_string())));
        assert!(pairs.contains(&("entity".to_string(), "software".to_string())));
    }

    #[test]
    fn test_lookup_response_tolerates_missing_results() {
        let parsed: LookupResponse = serde_json::from_str(r#"{"resultCount":0}"#).unwrap();
        assert!(parsed.results.is_empty());
    }
}
