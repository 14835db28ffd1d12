use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters, shared by the workers and the aggregator.
///
/// Plain atomics: each counter is independent and read only for display.
#[derive(Debug, Default)]
pub struct CaptureStats {
    /// Frames read from any capture handle
    received: AtomicU64,

    /// Records dropped because the inbound queue was full
    dropped: AtomicU64,

    /// Frames that ended up with the `PKT` fallback label
    unclassified: AtomicU64,

    /// Records appended to the retention buffer
    appended: AtomicU64,

    /// Records evicted from the retention buffer to honour its capacity
    evicted: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub dropped: u64,
    pub unclassified: u64,
    pub appended: u64,
    pub evicted: u64,
}

impl CaptureStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unclassified(&self) {
        self.unclassified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_appended(&self, evicted: usize) {
        self.appended.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
            appended: self.appended.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}
