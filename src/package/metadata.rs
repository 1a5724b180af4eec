//! `iTunesMetadata.plist` generation.
//!
//! Install tooling reads this file from the package root to identify the
//! artifact. Catalog values come from the artifact descriptor; the remaining
//! keys carry the fixed values install tooling expects for a free app.

use plist::{Dictionary, Value};

use super::error::PackageError;
use crate::store::{StoreItem, normalize_storefront};

/// File name of the metadata entry at the package root.
pub const METADATA_FILE_NAME: &str = "iTunesMetadata.plist";

const DEFAULT_STOREFRONT_ID: i64 = 143_441;
const GENRE: &str = "Productivity";
const GENRE_ID: i64 = 6007;
const RELEASE_DATE: &str = "2025-01-01T00:00:00Z";
const COPYRIGHT: &str = "Copyright © 2025";
const SUPPORTED_DEVICE_IDS: [i64; 2] = [1, 2];

/// Values written into `iTunesMetadata.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    /// Catalog (adam) id of the item.
    pub catalog_id: String,
    /// Bundle identifier.
    pub bundle_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Marketing version.
    pub version: String,
    /// External version id of this build.
    pub external_version_id: String,
    /// Every known external version id.
    pub external_version_ids: Vec<i64>,
    /// Raw storefront of the identity that acquired the item.
    pub storefront: String,
}

impl PackageMetadata {
    /// Collects metadata for `item` acquired under `storefront`.
    #[must_use]
    pub fn from_item(catalog_id: &str, item: &StoreItem, storefront: &str) -> Self {
        let metadata = &item.metadata;
        Self {
            catalog_id: catalog_id.to_string(),
            bundle_id: metadata.bundle_id.clone(),
            display_name: metadata.bundle_display_name.clone(),
            version: metadata.bundle_short_version_string.clone(),
            external_version_id: metadata.software_version_external_identifier.clone(),
            external_version_ids: metadata
                .software_version_external_identifiers
                .clone()
                .unwrap_or_default(),
            storefront: storefront.to_string(),
        }
    }

    fn storefront_id(&self) -> i64 {
        normalize_storefront(&self.storefront)
            .parse()
            .unwrap_or(DEFAULT_STOREFRONT_ID)
    }

    /// Builds the metadata dictionary.
    #[must_use]
    pub fn to_dictionary(&self) -> Dictionary {
        let text = |value: &str| Value::String(value.to_string());
        let integer = |value: i64| Value::Integer(value.into());
        let integers =
            |values: &[i64]| Value::Array(values.iter().copied().map(integer).collect());

        let mut dict = Dictionary::new();
        dict.insert("appleId".to_string(), text(&self.bundle_id));
        dict.insert("artistId".to_string(), integer(0));
        dict.insert("artistName".to_string(), text(&self.display_name));
        dict.insert("bundleId".to_string(), text(&self.bundle_id));
        dict.insert("bundleVersion".to_string(), text(&self.version));
        dict.insert("copyright".to_string(), text(COPYRIGHT));
        dict.insert("drmVersionNumber".to_string(), integer(0));
        dict.insert("fileExtension".to_string(), text("ipa"));
        dict.insert(
            "fileName".to_string(),
            Value::String(format!("{}.ipa", self.display_name)),
        );
        dict.insert("genre".to_string(), text(GENRE));
        dict.insert("genreId".to_string(), integer(GENRE_ID));
        dict.insert(
            "itemId".to_string(),
            integer(self.catalog_id.parse().unwrap_or(0)),
        );
        dict.insert("itemName".to_string(), text(&self.display_name));
        dict.insert("kind".to_string(), text("software"));
        dict.insert("playlistName".to_string(), text("iOS Apps"));
        dict.insert("price".to_string(), Value::Real(0.0));
        dict.insert("priceDisplay".to_string(), text("Free"));
        dict.insert("rating".to_string(), text("4+"));
        dict.insert("releaseDate".to_string(), text(RELEASE_DATE));
        dict.insert("s".to_string(), integer(self.storefront_id()));
        dict.insert("softwareIcon57x57URL".to_string(), text(""));
        dict.insert("softwareIconNeedsShine".to_string(), Value::Boolean(false));
        dict.insert(
            "softwareSupportedDeviceIds".to_string(),
            integers(&SUPPORTED_DEVICE_IDS),
        );
        dict.insert("softwareVersionBundleId".to_string(), text(&self.bundle_id));
        dict.insert(
            "softwareVersionExternalIdentifier".to_string(),
            integer(self.external_version_id.parse().unwrap_or(0)),
        );
        dict.insert(
            "softwareVersionExternalIdentifiers".to_string(),
            integers(&self.external_version_ids),
        );
        dict.insert("subgenres".to_string(), Value::Array(Vec::new()));
        dict.insert("vendorId".to_string(), integer(0));
        dict.insert("versionRestrictions".to_string(), integer(0));
        dict
    }

    /// Serializes the metadata as an XML property list.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Metadata`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, PackageError> {
        let mut buffer = Vec::new();
        plist::to_writer_xml(&mut buffer, &Value::Dictionary(self.to_dictionary()))
            .map_err(|source| PackageError::Metadata { source })?;
        Ok(buffer)
    }
}
