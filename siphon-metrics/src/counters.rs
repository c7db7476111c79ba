use std::collections::BTreeMap;

use parking_lot::Mutex;
use siphon_common::UnixTimestamp;

/// The accumulated state of a single monotonic counter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterState {
    /// Sum of all deltas seen so far.
    pub value: f64,
    /// Measure time of the flush that last changed this counter.
    pub last_update: UnixTimestamp,
}

/// Running totals of counters reported in monotonic mode.
///
/// Totals are keyed by the raw metric name, before sanitizing and source extraction, and live
/// for as long as the owning flusher. They are never reset or expired.
#[derive(Debug, Default)]
pub struct MonotonicCounters {
    inner: Mutex<BTreeMap<String, CounterState>>,
}

impl MonotonicCounters {
    /// Creates an empty set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the counter and returns the new total.
    ///
    /// Unknown counters start at zero.
    pub fn increment(&self, name: &str, delta: f64, now: UnixTimestamp) -> f64 {
        let mut inner = self.inner.lock();
        let state = inner.entry(name.to_owned()).or_insert(CounterState {
            value: 0.0,
            last_update: now,
        });

        state.value += delta;
        state.last_update = now;
        state.value
    }

    /// Returns the current state of a counter.
    pub fn get(&self, name: &str) -> Option<CounterState> {
        self.inner.lock().get(name).copied()
    }

    /// Returns the number of tracked counters.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if no counter has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
