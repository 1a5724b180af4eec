//! Shared User-Agent strings.
//!
//! Storefront endpoints only accept requests that identify as the vendor's
//! configurator client. Everything else (artifact CDN, catalog lookup,
//! version history) identifies as this tool.

/// Client identifier the storefront endpoints expect.
pub(crate) const STOREFRONT_CLIENT_IDENTIFIER: &str =
    "Configurator/2.15 (Macintosh; OS X 11.0.0; 16G29) AppleWebKit/2603.3.8";

/// User-Agent for artifact downloads and auxiliary lookups.
#[must_use]
pub(crate) fn default_tool_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("ipafetch/{version}")
}
