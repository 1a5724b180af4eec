//! Storefront identifiers and region resolution.

use serde::{Deserialize, Serialize};

use super::constants::DEFAULT_STOREFRONT;

/// Numeric storefront ids mapped to ISO country codes.
const STOREFRONT_COUNTRIES: &[(&str, &str)] = &[
    ("143441", "US"),
    ("143465", "CN"),
    ("143444", "GB"),
    ("143462", "JP"),
    ("143455", "CA"),
    ("143460", "AU"),
    ("143443", "DE"),
    ("143442", "FR"),
    ("143466", "KR"),
    ("143470", "TW"),
    ("143463", "HK"),
    ("143450", "IT"),
    ("143454", "ES"),
    ("143503", "BR"),
    ("143469", "RU"),
    ("143467", "IN"),
    ("143468", "MX"),
    ("143452", "NL"),
    ("143456", "SE"),
    ("143459", "CH"),
    ("143464", "SG"),
];

const DEFAULT_COUNTRY: &str = "US";

/// Reduces a raw storefront value (`"143441-1,29"`) to its numeric id (`"143441"`).
///
/// Takes the leading run of digits. Values without one fall back to the
/// text before the first `-` or `,`.
#[must_use]
pub fn normalize_storefront(value: &str) -> String {
    let trimmed = value.trim();
    let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        return digits;
    }
    trimmed
        .split(['-', ','])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Country code for a storefront value; unknown storefronts resolve to `US`.
#[must_use]
pub fn country_for_storefront(value: &str) -> &'static str {
    let id = normalize_storefront(value);
    STOREFRONT_COUNTRIES
        .iter()
        .find(|(storefront, _)| *storefront == id)
        .map_or(DEFAULT_COUNTRY, |(_, country)| *country)
}

/// Storefront region attached to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCode {
    /// ISO country code (`US`, `CN`, ...).
    pub country_code: String,
    /// Raw storefront value as reported at sign-in.
    pub storefront: String,
}

impl RegionCode {
    /// Resolves the region for a raw storefront value.
    #[must_use]
    pub fn from_storefront(storefront: &str) -> Self {
        let storefront = if storefront.trim().is_empty() {
            DEFAULT_STOREFRONT
        } else {
            storefront.trim()
        };
        Self {
            country_code: country_for_storefront(storefront).to_string(),
            storefront: storefront.to_string(),
        }
    }

    /// Numeric storefront id sent on authenticated requests.
    #[must_use]
    pub fn storefront_id(&self) -> String {
        normalize_storefront(&self.storefront)
    }
}

impl Default for RegionCode {
    fn default() -> Self {
        Self::from_storefront(DEFAULT_STOREFRONT)
    }
}
