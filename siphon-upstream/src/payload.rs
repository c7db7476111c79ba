use serde::Serialize;
use siphon_common::UnixTimestamp;
use siphon_metrics::{Batch, Measurement};

/// The JSON body of a request to `/v1/metrics`.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    /// Gauge measurements.
    pub gauges: &'a [Measurement],
    /// Counter measurements.
    pub counters: &'a [Measurement],
    /// Time all measurements are reported at.
    pub measure_time: UnixTimestamp,
    /// Default source for measurements that do not carry their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
}

impl<'a> Payload<'a> {
    /// Creates the payload for a batch.
    pub fn new(batch: &'a Batch, source: Option<&'a str>) -> Self {
        Self {
            gauges: &batch.gauges,
            counters: &batch.counters,
            measure_time: batch.measure_time,
            source,
        }
    }

    /// Serializes the payload to JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
