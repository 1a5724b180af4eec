//! Version history: a best-effort third-party index, with the artifact
//! descriptor's own version fields as the fallback.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::CATALOG_TIMEOUT;
use crate::store::{StoreError, StoreItem};
use crate::user_agent::default_tool_user_agent;

/// Default version history endpoint.
pub const DEFAULT_VERSION_HISTORY_URL: &str = "https://api.timbrd.com/apple/app-version/index.php";

/// Historical ids listed by the descriptor fallback, excluding the current one.
pub const MAX_HISTORICAL_VERSIONS: usize = 20;

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One downloadable version of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppVersion {
    /// Marketing version, when known. The descriptor fallback only knows it
    /// for the current version.
    pub version: Option<String>,
    /// External version id accepted by the license check.
    pub external_id: String,
    /// Whether this is the latest version.
    pub is_current: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    bundle_version: String,
    external_identifier: serde_json::Value,
    #[serde(default)]
    created_at: String,
}

impl HistoryEntry {
    fn external_id(&self) -> Option<String> {
        match &self.external_identifier {
            serde_json::Value::Number(number) => Some(number.to_string()),
            serde_json::Value::String(text) if !text.trim().is_empty() => {
                Some(text.trim().to_string())
            }
            _ => None,
        }
    }

    fn created(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.created_at.trim(), CREATED_AT_FORMAT).ok()
    }
}

/// Client for the third-party version history index.
#[derive(Debug, Clone)]
pub struct VersionHistory {
    client: Client,
    base_url: String,
}

impl VersionHistory {
    /// Creates a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_url(DEFAULT_VERSION_HISTORY_URL)
    }

    /// Creates a client for a custom endpoint (for testing with wiremock).
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
            base_url: base_url.into(),
        })
    }

    /// Fetches the history for `catalog_id`, newest first.
    ///
    /// Every failure (transport, status, body, empty list) yields `None`.
    #[instrument(skip(self))]
    pub async fn fetch(&self, catalog_id: &str) -> Option<Vec<AppVersion>> {
        let url = match Url::parse_with_params(&self.base_url, &[("id", catalog_id)]) {
            Ok(url) => url,
            Err(error) => {
                debug!(error = %error, "version history URL rejected");
                return None;
            }
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "version history request failed");
                return None;
            }
        };
        if response.status() != StatusCode::OK {
            debug!(status = response.status().as_u16(), "version history unavailable");
            return None;
        }

        let entries: Vec<HistoryEntry> = match response.json().await {
            Ok(entries) => entries,
            Err(error) => {
                debug!(error = %error, "version history body rejected");
                return None;
            }
        };

        let versions = order_history(entries);
        debug!(versions = versions.len(), "version history fetched");
        (!versions.is_empty()).then_some(versions)
    }
}

fn order_history(mut entries: Vec<HistoryEntry>) -> Vec<AppVersion> {
    // Dated entries first, newest first; undated ones by version.
    entries.sort_by(|a, b| {
        b.created()
            .cmp(&a.created())
            .then_with(|| compare_versions(&b.bundle_version, &a.bundle_version))
    });

    entries
        .iter()
        .filter_map(|entry| {
            entry.external_id().map(|external_id| AppVersion {
                version: Some(entry.bundle_version.clone()),
                external_id,
                is_current: false,
            })
        })
        .enumerate()
        .map(|(index, version)| AppVersion {
            is_current: index == 0,
            ..version
        })
        .collect()
}

/// Compares dotted numeric versions; missing or non-numeric parts count as 0.
fn compare_versions(left: &str, right: &str) -> Ordering {
    let parts = |version: &str| -> Vec<u64> {
        version
            .split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (left, right) = (parts(left), parts(right));
    let len = left.len().max(right.len());
    (0..len)
        .map(|index| {
            let a = left.get(index).copied().unwrap_or(0);
            let b = right.get(index).copied().unwrap_or(0);
            a.cmp(&b)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Versions derivable from a single artifact descriptor: the current one,
/// then up to [`MAX_HISTORICAL_VERSIONS`] historical ids, newest first.
#[must_use]
pub fn versions_from_item(item: &StoreItem) -> Vec<AppVersion> {
    let metadata = &item.metadata;
    let current_id = metadata.software_version_external_identifier.clone();

    let mut versions = vec![AppVersion {
        version: Some(metadata.bundle_short_version_string.clone()),
        external_id: current_id.clone(),
        is_current: true,
    }];

    if let Some(history) = &metadata.software_version_external_identifiers {
        versions.extend(
            history
                .iter()
                .rev()
                .map(ToString::to_string)
                .filter(|id| *id != current_id)
                .take(MAX_HISTORICAL_VERSIONS)
                .map(|external_id| AppVersion {
                    version: None,
                    external_id,
                    is_current: false,
                }),
        );
    }
    versions
}
