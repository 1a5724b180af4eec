//! Storefront response bodies and package archives for integration tests.

use std::io::{Cursor, Read, Write};

use ipafetch_core::auth::Account;
use plist::{Dictionary, Value};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const DSID: &str = "8000000001";
pub const TOKEN: &str = "token-abc";
pub const CATALOG_ID: &str = "284882215";

pub fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

pub fn plist_body(dict: Dictionary) -> Vec<u8> {
    let mut buffer = Vec::new();
    plist::to_writer_xml(&mut buffer, &Value::Dictionary(dict)).expect("encode plist");
    buffer
}

pub fn decode_plist(bytes: &[u8]) -> Dictionary {
    Value::from_reader(Cursor::new(bytes))
        .expect("decode plist")
        .into_dictionary()
        .expect("plist root is a dictionary")
}

/// Successful sign-in body for `dsid`.
pub fn auth_success_body(dsid: &str) -> Vec<u8> {
    let mut address = Dictionary::new();
    address.insert("firstName".to_string(), text("Ada"));
    address.insert("lastName".to_string(), text("Lovelace"));

    let mut info = Dictionary::new();
    info.insert("appleId".to_string(), text("ada@example.com"));
    info.insert("address".to_string(), Value::Dictionary(address));

    let mut dict = Dictionary::new();
    dict.insert("accountInfo".to_string(), Value::Dictionary(info));
    dict.insert("passwordToken".to_string(), text(TOKEN));
    dict.insert("dsPersonId".to_string(), text(dsid));
    plist_body(dict)
}

/// Body carrying a `failureType` and optional customer message.
pub fn failure_body(failure_type: &str, customer_message: Option<&str>) -> Vec<u8> {
    let mut dict = Dictionary::new();
    dict.insert("failureType".to_string(), text(failure_type));
    if let Some(message) = customer_message {
        dict.insert("customerMessage".to_string(), text(message));
    }
    plist_body(dict)
}

/// Sign-in body asking for a verification code.
pub fn code_required_body() -> Vec<u8> {
    let mut dict = Dictionary::new();
    dict.insert(
        "customerMessage".to_string(),
        text("MZFinance.BadLogin.Configurator_message"),
    );
    plist_body(dict)
}

/// License-check body with one artifact at `url`.
pub fn song_list_body(url: &str) -> Vec<u8> {
    let mut metadata = Dictionary::new();
    metadata.insert("softwareVersionBundleId".to_string(), text("com.example.notes"));
    metadata.insert("bundleDisplayName".to_string(), text("Notes Plus"));
    metadata.insert("bundleShortVersionString".to_string(), text("3.1"));
    metadata.insert(
        "softwareVersionExternalIdentifier".to_string(),
        Value::Integer(851_234_567_i64.into()),
    );
    metadata.insert(
        "softwareVersionExternalIdentifiers".to_string(),
        Value::Array(vec![
            Value::Integer(800_000_001_i64.into()),
            Value::Integer(851_234_567_i64.into()),
        ]),
    );

    let mut sinf = Dictionary::new();
    sinf.insert("id".to_string(), Value::Integer(0_i64.into()));
    sinf.insert("sinf".to_string(), Value::Data(vec![1, 2, 3, 4]));

    let mut song = Dictionary::new();
    song.insert("URL".to_string(), text(url));
    song.insert("md5".to_string(), text("d41d8cd98f00b204e9800998ecf8427e"));
    song.insert("sinfs".to_string(), Value::Array(vec![Value::Dictionary(sinf)]));
    song.insert("metadata".to_string(), Value::Dictionary(metadata));

    let mut dict = Dictionary::new();
    dict.insert("songList".to_string(), Value::Array(vec![Value::Dictionary(song)]));
    dict.insert("dsPersonID".to_string(), text(DSID));
    plist_body(dict)
}

/// License-check body with an empty `songList`.
pub fn empty_song_list_body() -> Vec<u8> {
    let mut dict = Dictionary::new();
    dict.insert("songList".to_string(), Value::Array(Vec::new()));
    plist_body(dict)
}

/// Successful purchase body.
pub fn purchase_success_body() -> Vec<u8> {
    let mut dict = Dictionary::new();
    dict.insert("jingleDocType".to_string(), text("purchaseSuccess"));
    plist_body(dict)
}

/// Purchase body that demands user interaction.
pub fn purchase_dialog_body() -> Vec<u8> {
    let mut dialog = Dictionary::new();
    dialog.insert("message".to_string(), text("Confirm your purchase"));
    let mut dict = Dictionary::new();
    dict.insert("dialog".to_string(), Value::Dictionary(dialog));
    plist_body(dict)
}

/// Signed-in identity matching the fixtures.
pub fn account() -> Account {
    Account::new("ada@example.com", DSID, TOKEN, "143441-1,29")
        .with_cookies(vec!["mz_at0=session; domain=.apple.com; path=/; secure".to_string()])
}

/// A small package archive.
pub fn ipa_bytes() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.add_directory("Payload/", options).expect("dir");
    writer.add_directory("Payload/Notes.app/", options).expect("dir");
    writer
        .start_file("Payload/Notes.app/Info.plist", options)
        .expect("file");
    writer.write_all(b"<plist>info</plist>").expect("write");
    writer
        .start_file("Payload/Notes.app/Notes", options)
        .expect("file");
    writer.write_all(&[0xCA, 0xFE, 0xBA, 0xBE]).expect("write");
    writer.finish().expect("finish").into_inner()
}

/// File entries of an archive on disk as `(name, bytes)`.
pub fn archive_files(path: &std::path::Path) -> Vec<(String, Vec<u8>)> {
    let file = std::fs::File::open(path).expect("open archive");
    let mut archive = ZipArchive::new(file).expect("read archive");
    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).expect("entry");
        if entry.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).expect("read entry");
        files.push((entry.name().to_string(), bytes));
    }
    files
}
