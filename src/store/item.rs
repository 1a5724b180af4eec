//! Artifact descriptors returned by the license-check endpoint.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use plist::{Dictionary, Value};

/// One DRM signature blob attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sinf {
    /// Signature slot id.
    pub id: i64,
    /// Base64-encoded signature payload.
    pub sinf: String,
}

/// Descriptive metadata for a downloadable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemMetadata {
    /// Bundle identifier (`com.example.app`).
    pub bundle_id: String,
    /// Human-readable name.
    pub bundle_display_name: String,
    /// Marketing version (`1.2.3`).
    pub bundle_short_version_string: String,
    /// External version id of this build, as text.
    pub software_version_external_identifier: String,
    /// Every historical external version id, oldest first, when reported.
    pub software_version_external_identifiers: Option<Vec<i64>>,
}

/// A time-limited artifact URL plus the metadata needed to repackage it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreItem {
    /// Signed artifact URL.
    pub url: String,
    /// Checksum reported by the storefront (informational).
    pub md5: String,
    /// DRM signature blobs.
    pub sinfs: Vec<Sinf>,
    /// Descriptive metadata.
    pub metadata: ItemMetadata,
}

pub(crate) fn text_field(dict: &Dictionary, key: &str) -> Option<String> {
    match dict.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Integer(number) => Some(number.to_string()),
        Value::Boolean(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn first_text(dict: &Dictionary, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_field(dict, key))
}

impl StoreItem {
    /// Decodes one `songList` entry. Entries without a URL or checksum are rejected.
    pub(crate) fn from_dictionary(dict: &Dictionary) -> Option<Self> {
        let url = dict.get("URL").and_then(Value::as_string)?.to_string();
        let md5 = dict.get("md5").and_then(Value::as_string)?.to_string();

        let sinfs = dict
            .get("sinfs")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_dictionary)
                    .filter_map(Sinf::from_dictionary)
                    .collect()
            })
            .unwrap_or_default();

        let metadata = dict
            .get("metadata")
            .and_then(Value::as_dictionary)
            .map(ItemMetadata::from_dictionary)
            .unwrap_or_default();

        Some(Self {
            url,
            md5,
            sinfs,
            metadata,
        })
    }
}

impl Sinf {
    fn from_dictionary(dict: &Dictionary) -> Option<Self> {
        let id = dict.get("id").and_then(Value::as_signed_integer)?;
        let sinf = match dict.get("sinf")? {
            Value::Data(bytes) => STANDARD.encode(bytes),
            Value::String(text) => text.clone(),
            _ => return None,
        };
        Some(Self { id, sinf })
    }
}

impl ItemMetadata {
    fn from_dictionary(dict: &Dictionary) -> Self {
        let software_version_external_identifiers = dict
            .get("softwareVersionExternalIdentifiers")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_signed_integer).collect());

        Self {
            bundle_id: first_text(dict, &["softwareVersionBundleId", "bundle-identifier"])
                .unwrap_or_default(),
            bundle_display_name: first_text(dict, &["bundleDisplayName", "itemName", "item-name"])
                .unwrap_or_default(),
            bundle_short_version_string: first_text(
                dict,
                &["bundleShortVersionString", "bundle-short-version-string"],
            )
            .unwrap_or_default(),
            software_version_external_identifier: text_field(
                dict,
                "softwareVersionExternalIdentifier",
            )
            .unwrap_or_else(|| "0".to_string()),
            software_version_external_identifiers,
        }
    }
}
