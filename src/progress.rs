//! Progress UI for package transfers.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use ipafetch_core::download::{DownloadProgress, format_bytes, format_duration};

const BAR_TEMPLATE: &str = "{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner} {bytes} {msg}";

/// Terminal bar fed by download progress reports.
///
/// Starts as a spinner and becomes a bar once a report carries the total size.
#[derive(Debug, Clone)]
pub(crate) struct TransferBar {
    bar: ProgressBar,
}

impl TransferBar {
    pub(crate) fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub(crate) fn update(&self, progress: &DownloadProgress) {
        if let Some(total) = progress.total_bytes
            && self.bar.length() != Some(total)
        {
            self.bar.set_length(total);
            self.bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
        }
        self.bar.set_position(progress.downloaded_bytes);
        self.bar.set_message(status_message(progress));
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn status_message(progress: &DownloadProgress) -> String {
    if progress.finished {
        return "done".to_string();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let speed = format_bytes(progress.bytes_per_second.max(0.0) as u64);
    match progress.eta {
        Some(eta) => format!("{speed}/s, {} left", format_duration(eta)),
        None => format!("{speed}/s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(downloaded: u64, total: Option<u64>, eta: Option<Duration>) -> DownloadProgress {
        DownloadProgress {
            downloaded_bytes: downloaded,
            total_bytes: total,
            bytes_per_second: 2_000_000.0,
            eta,
            finished: false,
        }
    }

    #[test]
    fn test_status_message_with_eta() {
        let message = status_message(&report(10, Some(100), Some(Duration::from_secs(45))));
        assert_eq!(message, "2.0 MB/s, 45s left");
    }

    #[test]
    fn test_status_message_without_eta() {
        assert_eq!(status_message(&report(10, None, None)), "2.0 MB/s");
    }

    #[test]
    fn test_hidden_bar_tracks_length_and_position() {
        let bar = TransferBar::new(false);
        bar.update(&report(250, Some(1_000), None));
        assert_eq!(bar.bar.length(), Some(1_000));
        assert_eq!(bar.bar.position(), 250);
        bar.finish();
    }
}
