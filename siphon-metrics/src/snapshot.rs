use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Extra data computed for a timer by the statsd daemon.
///
/// Only the histogram is used. Other keys are ignored when parsing.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TimerData {
    /// Number of samples per histogram bin, keyed by bin label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<BTreeMap<String, f64>>,
}

/// The aggregated metrics the statsd daemon hands over at every flush.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// Counter deltas accumulated during the last interval.
    pub counters: BTreeMap<String, f64>,
    /// Current gauge values.
    pub gauges: BTreeMap<String, f64>,
    /// Unique members seen per set during the last interval.
    pub sets: BTreeMap<String, BTreeSet<String>>,
    /// Raw timer samples collected during the last interval, in any order.
    pub timers: BTreeMap<String, Vec<f64>>,
    /// Additional per-timer data.
    pub timer_data: BTreeMap<String, TimerData>,
    /// Percentiles to summarize every timer at.
    #[serde(alias = "pctThreshold")]
    pub percentiles: Vec<f64>,
}

impl MetricsSnapshot {
    /// Parses a snapshot from its JSON representation.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
