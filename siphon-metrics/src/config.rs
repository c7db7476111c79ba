use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters used by the [`Flusher`](crate::Flusher).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Source attached to every submitted batch.
    ///
    /// Sources extracted from metric names take precedence for individual measurements.
    pub source: Option<String>,

    /// A regular expression whose first capture group becomes the source of a measurement.
    ///
    /// The whole match is removed from the measurement name.
    pub source_regex: Option<String>,

    /// Interval in seconds at which the statsd daemon flushes.
    ///
    /// Defaults to `10` seconds.
    pub flush_interval: u64,

    /// Interval in seconds to align measure times to.
    ///
    /// Defaults to [`flush_interval`](Self::flush_interval). Set to `0` to report the exact
    /// flush time.
    pub snap_time: Option<u64>,

    /// Reports counters as gauges of the per-interval delta.
    ///
    /// When disabled, counters are accumulated across flushes and reported as monotonic
    /// counters. Defaults to `true`.
    pub counters_as_gauges: bool,

    /// Skips metrics the statsd daemon reports about itself.
    ///
    /// Defaults to `true`. Enables the synthetic `numStats` counter.
    pub skip_internal_metrics: bool,

    /// Name prefix of the metrics the statsd daemon reports about itself.
    ///
    /// Defaults to `"statsd."`.
    pub internal_prefix: String,

    /// Appends `.100` to the full timer summary.
    ///
    /// Defaults to `false`, which reports the full summary under the bare timer name.
    pub always_suffix_percentile: bool,

    /// Maximum number of measurements in a single batch.
    ///
    /// Defaults to `500`.
    pub batch_size: usize,
}

impl FlushConfig {
    /// Returns the interval measure times are aligned to.
    ///
    /// A zero duration disables alignment.
    pub fn snap_interval(&self) -> Duration {
        Duration::from_secs(self.snap_time.unwrap_or(self.flush_interval))
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            source: None,
            source_regex: None,
            flush_interval: 10,
            snap_time: None,
            counters_as_gauges: true,
            skip_internal_metrics: true,
            internal_prefix: "statsd.".to_owned(),
            always_suffix_percentile: false,
            batch_size: 500,
        }
    }
}
