use std::sync::Arc;

use siphon_common::UnixTimestamp;

use crate::{Batch, MeasureKind, Measurement, MonotonicCounters, SourceExtractor};

/// Receives full batches for delivery.
///
/// Submission must not block. Delivery happens asynchronously and its outcome is not reported
/// back to the flush.
pub trait BatchSink {
    /// Hands a batch over for delivery.
    fn submit(&self, batch: Batch);
}

impl<T: BatchSink + ?Sized> BatchSink for &T {
    fn submit(&self, batch: Batch) {
        (**self).submit(batch)
    }
}

impl<T: BatchSink + ?Sized> BatchSink for Arc<T> {
    fn submit(&self, batch: Batch) {
        (**self).submit(batch)
    }
}

/// Collects the measurements of a single flush into batches of bounded size.
///
/// Whenever the batch reaches the configured size it is submitted to the sink and a new, empty
/// batch with the same measure time is started. The final partial batch is submitted by
/// [`finish`](Self::finish).
pub struct MeasureAccumulator<'a> {
    sink: &'a dyn BatchSink,
    extractor: &'a SourceExtractor,
    counters: &'a MonotonicCounters,
    counters_as_gauges: bool,
    batch_size: usize,
    batch: Batch,
    num_stats: u64,
    batches: usize,
}

impl<'a> MeasureAccumulator<'a> {
    /// Creates an accumulator for measurements reported at `measure_time`.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn new(
        sink: &'a dyn BatchSink,
        extractor: &'a SourceExtractor,
        counters: &'a MonotonicCounters,
        counters_as_gauges: bool,
        batch_size: usize,
        measure_time: UnixTimestamp,
    ) -> Self {
        Self {
            sink,
            extractor,
            counters,
            counters_as_gauges,
            batch_size: batch_size.max(1),
            batch: Batch::new(measure_time),
            num_stats: 0,
            batches: 0,
        }
    }

    /// Adds a measurement whose name is still the raw metric name.
    ///
    /// The name is replaced by the extracted name and source. `countable` measurements increase
    /// the stat count reported as `numStats`.
    pub fn add(&mut self, kind: MeasureKind, mut measurement: Measurement, countable: bool) {
        let (name, source) = self.extractor.extract(measurement.name());
        measurement.relabel(name, source);

        self.batch.push(kind, measurement);
        if countable {
            self.num_stats += 1;
        }

        if self.batch.len() >= self.batch_size {
            self.submit_batch();
        }
    }

    /// Adds a counter delta according to the configured counter mode.
    ///
    /// In gauge mode the delta is reported as a gauge. Otherwise it is added to the running total,
    /// which is reported as a counter.
    pub fn add_counter(&mut self, name: &str, delta: f64) {
        if self.counters_as_gauges {
            self.add(MeasureKind::Gauge, Measurement::value(name, delta), true);
        } else {
            let total = self
                .counters
                .increment(name, delta, self.batch.measure_time);
            self.add(MeasureKind::Counter, Measurement::value(name, total), true);
        }
    }

    /// Returns the number of countable measurements added so far.
    pub fn num_stats(&self) -> u64 {
        self.num_stats
    }

    /// Submits the final batch if it is not empty and returns the number of submitted batches.
    pub fn finish(mut self) -> usize {
        if !self.batch.is_empty() {
            self.submit_batch();
        }
        self.batches
    }

    fn submit_batch(&mut self) {
        let measure_time = self.batch.measure_time;
        let batch = std::mem::replace(&mut self.batch, Batch::new(measure_time));
        siphon_log::trace!(
            gauges = batch.gauges.len(),
            counters = batch.counters.len(),
            "submitting batch"
        );
        self.sink.submit(batch);
        self.batches += 1;
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Batch>>);

    impl BatchSink for RecordingSink {
        fn submit(&self, batch: Batch) {
            self.0.lock().push(batch);
        }
    }

    #[test]
    fn test_splits_at_batch_size() {
        let sink = RecordingSink::default();
        let extractor = SourceExtractor::None;
        let counters = MonotonicCounters::new();
        let ts = UnixTimestamp::from_secs(100);

        let mut accumulator = MeasureAccumulator::new(&sink, &extractor, &counters, true, 2, ts);
        for i in 0..5 {
            accumulator.add(MeasureKind::Gauge, Measurement::value(format!("g{i}"), 1.0), true);
        }
        assert_eq!(accumulator.num_stats(), 5);
        assert_eq!(accumulator.finish(), 3);

        let batches = sink.0.into_inner();
        let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert!(batches.iter().all(|b| b.measure_time == ts));
    }

    #[test]
    fn test_exact_multiple_has_no_empty_batch() {
        let sink = RecordingSink::default();
        let extractor = SourceExtractor::None;
        let counters = MonotonicCounters::new();

        let mut accumulator = MeasureAccumulator::new(
            &sink,
            &extractor,
            &counters,
            true,
            2,
            UnixTimestamp::from_secs(0),
        );
        accumulator.add(MeasureKind::Gauge, Measurement::value("a", 1.0), true);
        accumulator.add(MeasureKind::Counter, Measurement::value("b", 1.0), true);

        assert_eq!(accumulator.finish(), 1);
        assert_eq!(sink.0.lock().len(), 1);
    }

    #[test]
    fn test_uncountable() {
        let sink = RecordingSink::default();
        let extractor = SourceExtractor::None;
        let counters = MonotonicCounters::new();

        let mut accumulator = MeasureAccumulator::new(
            &sink,
            &extractor,
            &counters,
            true,
            10,
            UnixTimestamp::from_secs(0),
        );
        accumulator.add(MeasureKind::Gauge, Measurement::value("a", 1.0), false);
        accumulator.add(MeasureKind::Gauge, Measurement::value("b", 1.0), true);

        assert_eq!(accumulator.num_stats(), 1);
    }

    #[test]
    fn test_applies_extractor() {
        let sink = RecordingSink::default();
        let extractor = SourceExtractor::regex(r"^(host-\d+)\.").unwrap();
        let counters = MonotonicCounters::new();

        let mut accumulator = MeasureAccumulator::new(
            &sink,
            &extractor,
            &counters,
            true,
            10,
            UnixTimestamp::from_secs(0),
        );
        accumulator.add(MeasureKind::Gauge, Measurement::value("host-1.load avg", 1.0), true);
        accumulator.finish();

        let batches = sink.0.into_inner();
        assert_eq!(
            batches[0].gauges,
            [Measurement::Value {
                name: "load_avg".to_owned(),
                value: 1.0,
                source: Some("host-1".to_owned()),
            }]
        );
    }

    #[test]
    fn test_monotonic_counter() {
        let sink = RecordingSink::default();
        let extractor = SourceExtractor::None;
        let counters = MonotonicCounters::new();

        for (ts, delta) in [(10, 5.0), (20, 7.0)] {
            let mut accumulator = MeasureAccumulator::new(
                &sink,
                &extractor,
                &counters,
                false,
                10,
                UnixTimestamp::from_secs(ts),
            );
            accumulator.add_counter("hits", delta);
            accumulator.finish();
        }

        let batches = sink.0.into_inner();
        assert_eq!(batches[0].counters, [Measurement::value("hits", 5.0)]);
        assert_eq!(batches[1].counters, [Measurement::value("hits", 12.0)]);
        assert!(batches.iter().all(|b| b.gauges.is_empty()));
    }

    #[test]
    fn test_counter_as_gauge() {
        let sink = RecordingSink::default();
        let extractor = SourceExtractor::None;
        let counters = MonotonicCounters::new();

        let mut accumulator = MeasureAccumulator::new(
            &sink,
            &extractor,
            &counters,
            true,
            10,
            UnixTimestamp::from_secs(0),
        );
        accumulator.add_counter("hits", 5.0);
        accumulator.finish();

        assert_eq!(sink.0.lock()[0].gauges, [Measurement::value("hits", 5.0)]);
        assert!(counters.is_empty());
    }
}
