use serde::{Deserialize, Serialize};
use siphon_common::UnixTimestamp;

/// The group a [`Measurement`] is submitted in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    /// Absolute values, and summaries of timers.
    Gauge,
    /// Monotonically increasing values.
    Counter,
}

/// A single named data point submitted to Librato.
///
/// Serializes without a tag, so each variant is distinguished only by the fields it carries.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Measurement {
    /// A single value.
    Value {
        /// Sanitized measurement name.
        name: String,
        /// The value.
        value: f64,
        /// Sanitized source, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// A summary over a series of samples.
    Aggregate {
        /// Sanitized measurement name.
        name: String,
        /// Number of samples.
        count: u64,
        /// Sum of all samples.
        sum: f64,
        /// Sum of the squares of all samples.
        sum_squares: f64,
        /// Smallest sample.
        min: f64,
        /// Largest sample.
        max: f64,
        /// Sanitized source, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

impl Measurement {
    /// Creates a single value measurement without a source.
    pub fn value(name: impl Into<String>, value: f64) -> Self {
        Self::Value {
            name: name.into(),
            value,
            source: None,
        }
    }

    /// Returns the name of this measurement.
    pub fn name(&self) -> &str {
        match self {
            Self::Value { name, .. } | Self::Aggregate { name, .. } => name,
        }
    }

    /// Returns the source of this measurement, if any.
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Value { source, .. } | Self::Aggregate { source, .. } => source.as_deref(),
        }
    }

    /// Replaces the name and, if given, the source of this measurement.
    pub fn relabel(&mut self, new_name: String, new_source: Option<String>) {
        match self {
            Self::Value { name, source, .. } | Self::Aggregate { name, source, .. } => {
                *name = new_name;
                if new_source.is_some() {
                    *source = new_source;
                }
            }
        }
    }
}

/// A group of measurements submitted in a single request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Batch {
    /// Measurements of kind [`MeasureKind::Gauge`].
    pub gauges: Vec<Measurement>,
    /// Measurements of kind [`MeasureKind::Counter`].
    pub counters: Vec<Measurement>,
    /// The time all measurements in this batch are reported at.
    pub measure_time: UnixTimestamp,
}

impl Batch {
    /// Creates an empty batch reported at the given time.
    pub fn new(measure_time: UnixTimestamp) -> Self {
        Self {
            gauges: Vec::new(),
            counters: Vec::new(),
            measure_time,
        }
    }

    /// Adds a measurement to the list of its kind.
    pub fn push(&mut self, kind: MeasureKind, measurement: Measurement) {
        match kind {
            MeasureKind::Gauge => self.gauges.push(measurement),
            MeasureKind::Counter => self.counters.push(measurement),
        }
    }

    /// Returns the number of measurements across both kinds.
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    /// Returns `true` if the batch holds no measurements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
