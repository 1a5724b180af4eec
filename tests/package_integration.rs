//! Integration tests for metadata injection into downloaded packages.

use ipafetch_core::package::{METADATA_FILE_NAME, PackageError, PackageMetadata, repackage};
use ipafetch_core::store::{ItemMetadata, Sinf, StoreItem};
use plist::Value;
use tempfile::TempDir;

mod support;
use support::fixtures::{CATALOG_ID, archive_files, decode_plist, ipa_bytes};

fn item(version: &str) -> StoreItem {
    StoreItem {
        url: "https://cdn.example.com/notes.ipa".to_string(),
        md5: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
        sinfs: vec![Sinf {
            id: 0,
            sinf: "AQIDBA==".to_string(),
        }],
        metadata: ItemMetadata {
            bundle_id: "com.example.notes".to_string(),
            bundle_display_name: "Notes Plus".to_string(),
            bundle_short_version_string: version.to_string(),
            software_version_external_identifier: "851234567".to_string(),
            software_version_external_identifiers: Some(vec![800_000_001, 851_234_567]),
        },
    }
}

fn metadata_entries(files: &[(String, Vec<u8>)]) -> Vec<&Vec<u8>> {
    files
        .iter()
        .filter(|(name, _)| name == METADATA_FILE_NAME)
        .map(|(_, bytes)| bytes)
        .collect()
}

#[tokio::test]
async fn test_repackage_injects_metadata_and_keeps_payload() {
    let tempdir = TempDir::new().unwrap();
    let archive = tempdir.path().join("notes.ipa");
    std::fs::write(&archive, ipa_bytes()).unwrap();

    let metadata = PackageMetadata::from_item(CATALOG_ID, &item("3.1"), "143465-19,29");
    repackage(&archive, &metadata).await.unwrap();

    let files = archive_files(&archive);
    let entries = metadata_entries(&files);
    assert_eq!(entries.len(), 1);

    let dict = decode_plist(entries[0]);
    assert_eq!(
        dict.get("bundleVersion").and_then(Value::as_string),
        Some("3.1")
    );
    assert_eq!(dict.get("s").and_then(Value::as_signed_integer), Some(143_465));
    assert_eq!(
        dict.get("softwareVersionExternalIdentifier")
            .and_then(Value::as_signed_integer),
        Some(851_234_567)
    );
    assert_eq!(
        dict.get("softwareVersionExternalIdentifiers")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(2)
    );

    assert!(files.iter().any(|(name, bytes)| {
        name == "Payload/Notes.app/Info.plist" && bytes.as_slice() == b"<plist>info</plist>"
    }));
    assert!(
        files
            .iter()
            .any(|(name, _)| name == "Payload/Notes.app/Notes")
    );
}

#[tokio::test]
async fn test_repackage_twice_keeps_a_single_metadata_entry() {
    let tempdir = TempDir::new().unwrap();
    let archive = tempdir.path().join("notes.ipa");
    std::fs::write(&archive, ipa_bytes()).unwrap();

    let first = PackageMetadata::from_item(CATALOG_ID, &item("3.0"), "143441-1,29");
    repackage(&archive, &first).await.unwrap();
    let second = PackageMetadata::from_item(CATALOG_ID, &item("3.1"), "143441-1,29");
    repackage(&archive, &second).await.unwrap();

    let files = archive_files(&archive);
    let entries = metadata_entries(&files);
    assert_eq!(entries.len(), 1);
    let dict = decode_plist(entries[0]);
    assert_eq!(
        dict.get("bundleVersion").and_then(Value::as_string),
        Some("3.1")
    );
    assert_eq!(files.len(), 3);

    let leftovers: Vec<_> = std::fs::read_dir(tempdir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("notes.ipa")]);
}

#[tokio::test]
async fn test_repackage_missing_archive_fails() {
    let tempdir = TempDir::new().unwrap();
    let metadata = PackageMetadata::from_item(CATALOG_ID, &item("3.1"), "143441-1,29");
    let result = repackage(&tempdir.path().join("absent.ipa"), &metadata).await;
    assert!(matches!(result, Err(PackageError::Io { .. })));
}
