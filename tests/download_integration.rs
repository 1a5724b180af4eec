//! Integration tests for the streaming artifact downloader.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ipafetch_core::download::{
    ArtifactDownloader, DownloadError, DownloadProgress, ProgressCallback, artifact_file_name,
    resolve_output_path,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn recorder() -> (Arc<Mutex<Vec<DownloadProgress>>>, impl Fn(&DownloadProgress) + Send + Sync) {
    let reports: Arc<Mutex<Vec<DownloadProgress>>> = Arc::default();
    let sink = Arc::clone(&reports);
    let record = move |progress: &DownloadProgress| sink.lock().unwrap().push(progress.clone());
    (reports, record)
}

#[tokio::test]
async fn test_progress_reports_are_monotonic_and_end_complete() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let body: Vec<u8> = (0..2_000_000_u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/big.ipa"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let destination = tempdir.path().join("big.ipa");
    let (reports, record) = recorder();
    let callback: &ProgressCallback = &record;

    let downloader = ArtifactDownloader::new()
        .unwrap()
        .with_progress_interval(Duration::ZERO);
    let outcome = downloader
        .stream(
            &format!("{}/big.ipa", server.uri()),
            &destination,
            Some(callback),
        )
        .await
        .unwrap();

    assert_eq!(outcome.bytes_downloaded, body.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), body);

    let reports = reports.lock().unwrap();
    assert!(!reports.is_empty());
    assert!(
        reports
            .windows(2)
            .all(|pair| pair[0].downloaded_bytes <= pair[1].downloaded_bytes)
    );
    let last = reports.last().unwrap();
    assert!(last.finished);
    assert_eq!(last.downloaded_bytes, body.len() as u64);
    assert_eq!(last.fraction(), Some(1.0));
    assert!(reports[..reports.len() - 1].iter().all(|report| !report.finished));
}

#[tokio::test]
async fn test_stream_creates_parent_directories() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let body = vec![7_u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/app.ipa"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let destination = tempdir.path().join("nested").join("app.ipa");
    let outcome = ArtifactDownloader::new()
        .unwrap()
        .stream(&format!("{}/app.ipa", server.uri()), &destination, None)
        .await
        .unwrap();

    assert_eq!(outcome.bytes_downloaded, body.len() as u64);
    assert_eq!(outcome.content_length, Some(body.len() as u64));
    assert_eq!(std::fs::read(&destination).unwrap(), body);
}

#[tokio::test]
async fn test_existing_file_is_replaced() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/app.ipa"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .mount(&server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let destination = tempdir.path().join("app.ipa");
    std::fs::write(&destination, b"an older and much longer artifact").unwrap();

    let downloader = ArtifactDownloader::new().unwrap();
    downloader
        .stream(&format!("{}/app.ipa", server.uri()), &destination, None)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"new");
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/expired.ipa"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let url = format!("{}/expired.ipa", server.uri());
    let destination = tempdir.path().join("expired.ipa");
    let result = ArtifactDownloader::new()
        .unwrap()
        .stream(&url, &destination, None)
        .await;
    assert!(!destination.exists());

    match result {
        Err(DownloadError::HttpStatus { status, url: failed }) => {
            assert_eq!(status, 403);
            assert_eq!(failed, url);
        }
        other => panic!("expected HttpStatus error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let tempdir = TempDir::new().unwrap();
    let result = ArtifactDownloader::new()
        .unwrap()
        .stream(
            "http://127.0.0.1:9/unreachable.ipa",
            &tempdir.path().join("unreachable.ipa"),
            None,
        )
        .await;
    assert!(matches!(
        result,
        Err(DownloadError::Network { .. } | DownloadError::Timeout { .. })
    ));
}

#[test]
fn test_default_output_lands_in_existing_directory() {
    let tempdir = TempDir::new().unwrap();
    let name = artifact_file_name("Notes: Plus", "3.1");
    let resolved = resolve_output_path(Some(tempdir.path()), &name);
    assert_eq!(resolved, tempdir.path().join("Notes_ Plus_3.1.ipa"));
}
