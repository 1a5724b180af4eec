//! Transfer progress: throughput, ETA and human-readable summaries.
//!
//! [`ProgressTracker`] is driven with explicit [`Instant`]s so the rate and
//! ETA arithmetic is deterministic under test.

use std::time::{Duration, Instant};

/// One progress observation.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written so far.
    pub downloaded_bytes: u64,
    /// Advertised total size, when known.
    pub total_bytes: Option<u64>,
    /// Throughput over the last reporting interval (average over the whole
    /// transfer on the final report).
    pub bytes_per_second: f64,
    /// Estimated time remaining; `None` while the rate or total is unknown.
    pub eta: Option<Duration>,
    /// True on the final report.
    pub finished: bool,
}

impl DownloadProgress {
    /// Completed fraction in `0.0..=1.0`; `None` when the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        if self.finished {
            return Some(1.0);
        }
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| (self.downloaded_bytes as f64 / total as f64).min(1.0))
    }

    /// One-line summary such as `12.5 MB / 50.0 MB (25%) - 2.1 MB/s - 18s remaining`.
    #[must_use]
    pub fn summary(&self) -> String {
        let downloaded = format_bytes(self.downloaded_bytes);
        if self.finished {
            return format!("{downloaded} - done");
        }
        let speed = format!("{}/s", format_bytes(self.bytes_per_second.max(0.0) as u64));
        match (self.total_bytes, self.fraction()) {
            (Some(total), Some(fraction)) => {
                let remaining = self
                    .eta
                    .map_or_else(|| "calculating...".to_string(), |eta| {
                        format!("{} remaining", format_duration(eta))
                    });
                format!(
                    "{downloaded} / {} ({:.0}%) - {speed} - {remaining}",
                    format_bytes(total),
                    fraction * 100.0
                )
            }
            _ => format!("{downloaded} - {speed}"),
        }
    }
}

/// Turns a stream of byte counts into rate-limited progress reports.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: Option<u64>,
    interval: Duration,
    started_at: Instant,
    downloaded: u64,
    last_report_at: Instant,
    last_report_bytes: u64,
}

impl ProgressTracker {
    pub(crate) fn new(total: Option<u64>, interval: Duration, now: Instant) -> Self {
        Self {
            total: total.filter(|total| *total > 0),
            interval,
            started_at: now,
            downloaded: 0,
            last_report_at: now,
            last_report_bytes: 0,
        }
    }

    pub(crate) fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Records `bytes` written at `now`; returns a report once per interval.
    pub(crate) fn record(&mut self, bytes: u64, now: Instant) -> Option<DownloadProgress> {
        self.downloaded += bytes;
        let elapsed = now.saturating_duration_since(self.last_report_at);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }

        let delta = self.downloaded - self.last_report_bytes;
        let rate = delta as f64 / elapsed.as_secs_f64();
        self.last_report_at = now;
        self.last_report_bytes = self.downloaded;

        let eta = self.total.and_then(|total| {
            (rate > 0.0).then(|| {
                let remaining = total.saturating_sub(self.downloaded);
                Duration::from_secs_f64(remaining as f64 / rate)
            })
        });

        Some(DownloadProgress {
            downloaded_bytes: self.downloaded,
            total_bytes: self.total,
            bytes_per_second: rate,
            eta,
            finished: false,
        })
    }

    /// Final report: 100% complete with the whole-transfer average rate.
    pub(crate) fn finish(&self, now: Instant) -> DownloadProgress {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.downloaded as f64 / elapsed
        } else {
            0.0
        };
        DownloadProgress {
            downloaded_bytes: self.downloaded,
            total_bytes: Some(self.total.unwrap_or(self.downloaded)),
            bytes_per_second: rate,
            eta: Some(Duration::ZERO),
            finished: true,
        }
    }
}

/// Formats a byte count with decimal units (`1.5 MB`).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats a duration compactly (`45s`, `3m 05s`, `1h 02m`).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    match seconds {
        0..60 => format!("{seconds}s"),
        60..3600 => format!("{}m {:02}s", seconds / 60, seconds % 60),
        _ => format!("{}h {:02}m", seconds / 3600, (seconds % 3600) / 60),
    }
}
