//! Constants for artifact transfers.

use std::time::Duration;

/// Bytes buffered before each write to disk (8 KiB).
pub const STREAM_BUFFER_BYTES: usize = 8 * 1024;

/// Minimum spacing between progress reports.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
