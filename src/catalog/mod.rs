//! Catalog helpers outside the storefront protocol: bundle id lookup and
//! version history.

mod lookup;
mod versions;

use std::time::Duration;

/// Request timeout for catalog and version history calls.
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

pub use lookup::{CatalogEntry, CatalogLookup, ItunesLookup};
pub use versions::{
    AppVersion, DEFAULT_VERSION_HISTORY_URL, MAX_HISTORICAL_VERSIONS, VersionHistory,
    versions_from_item,
};
