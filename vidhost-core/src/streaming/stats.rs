//! Statistics tracking for ranged file streams

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every stream opened through one
/// [`RangeStreamer`](super::RangeStreamer).
///
/// Updated lock-free from the body streams; read through [`Self::snapshot`].
#[derive(Debug, Default)]
pub struct StreamStats {
    streams_opened: AtomicU64,
    streams_completed: AtomicU64,
    streams_aborted: AtomicU64,
    premature_eofs: AtomicU64,
    bytes_served: AtomicU64,
    open_handles: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    /// Streams whose file was opened and handed to a body
    pub streams_opened: u64,
    /// Streams that produced their last byte (or hit end of file)
    pub streams_completed: u64,
    /// Streams dropped early or failed mid-read
    pub streams_aborted: u64,
    /// Streams that ended short because the file shrank under them
    pub premature_eofs: u64,
    /// Total body bytes produced
    pub bytes_served: u64,
    /// File handles currently held by live streams
    pub open_handles: u64,
}

impl StreamStats {
    /// Creates new zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// File handles currently held by live streams.
    pub fn open_handles(&self) -> u64 {
        self.open_handles.load(Ordering::Acquire)
    }

    /// Copies all counters.
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_aborted: self.streams_aborted.load(Ordering::Relaxed),
            premature_eofs: self.premature_eofs.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
            open_handles: self.open_handles.load(Ordering::Acquire),
        }
    }

    pub(crate) fn record_open(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
        self.open_handles.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_bytes(&self, bytes: u64) {
        self.bytes_served.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_premature_eof(&self) {
        self.premature_eofs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self, completed: bool) {
        if completed {
            self.streams_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.streams_aborted.fetch_add(1, Ordering::Relaxed);
        }
        self.open_handles.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_release_balance() {
        let stats = StreamStats::new();

        stats.record_open();
        stats.record_open();
        assert_eq!(stats.open_handles(), 2);

        stats.record_bytes(100);
        stats.record_release(true);
        stats.record_release(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.streams_opened, 2);
        assert_eq!(snapshot.streams_completed, 1);
        assert_eq!(snapshot.streams_aborted, 1);
        assert_eq!(snapshot.bytes_served, 100);
        assert_eq!(snapshot.open_handles, 0);
    }

    #[test]
    fn test_snapshot_serializes_counter_names() {
        let stats = StreamStats::new();
        stats.record_open();
        stats.record_premature_eof();
        stats.record_release(true);

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["streams_opened"], 1);
        assert_eq!(json["streams_completed"], 1);
        assert_eq!(json["premature_eofs"], 1);
        assert_eq!(json["open_handles"], 0);
    }
}
