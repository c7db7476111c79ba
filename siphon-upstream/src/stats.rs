use std::sync::atomic::{AtomicU64, Ordering};

use siphon_common::UnixTimestamp;

/// Process-wide delivery statistics for an external status reporter.
#[derive(Debug, Default)]
pub struct FlushStats {
    last_flush: AtomicU64,
    last_exception: AtomicU64,
}

impl FlushStats {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request was dispatched, regardless of its outcome.
    pub fn record_dispatch(&self, timestamp: UnixTimestamp) {
        self.last_flush.store(timestamp.as_secs(), Ordering::Relaxed);
    }

    /// Records that a batch was dropped without being accepted.
    pub fn record_exception(&self, timestamp: UnixTimestamp) {
        self.last_exception
            .store(timestamp.as_secs(), Ordering::Relaxed);
    }

    /// Returns the time a request was last dispatched, if any.
    pub fn last_flush(&self) -> Option<UnixTimestamp> {
        Self::load(&self.last_flush)
    }

    /// Returns the time a batch was last dropped, if any.
    pub fn last_exception(&self) -> Option<UnixTimestamp> {
        Self::load(&self.last_exception)
    }

    /// Returns all values as `(name, epoch seconds)` pairs. Zero means never.
    pub fn status(&self) -> [(&'static str, u64); 2] {
        [
            ("last_flush", self.last_flush.load(Ordering::Relaxed)),
            ("last_exception", self.last_exception.load(Ordering::Relaxed)),
        ]
    }

    fn load(value: &AtomicU64) -> Option<UnixTimestamp> {
        match value.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(UnixTimestamp::from_secs(secs)),
        }
    }
}
