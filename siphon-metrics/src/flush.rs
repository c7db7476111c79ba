use siphon_common::UnixTimestamp;

use crate::{
    BatchSink, FlushConfig, MeasureAccumulator, MeasureKind, Measurement, MetricsSnapshot,
    MonotonicCounters, SourceExtractor, SourceExtractorError, percentile_suffix, summarize,
};

/// Name of the synthetic counter carrying the number of stats in a flush.
pub const NUM_STATS_NAME: &str = "numStats";

/// The result of a single call to [`Flusher::flush`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlushReport {
    /// The aligned time all batches of this flush were reported at.
    pub measure_time: UnixTimestamp,
    /// Number of countable measurements, excluding `numStats` itself.
    pub num_stats: u64,
    /// Number of batches submitted to the sink.
    pub batches: usize,
}

/// Converts metrics snapshots into measurement batches.
///
/// The flusher is invoked once per flush interval. It holds the monotonic counter totals across
/// calls and submits every batch to its [`BatchSink`] without waiting for delivery.
#[derive(Debug)]
pub struct Flusher<S> {
    config: FlushConfig,
    extractor: SourceExtractor,
    counters: MonotonicCounters,
    sink: S,
}

impl<S: BatchSink> Flusher<S> {
    /// Creates a flusher that extracts sources with the configured regex, if any.
    pub fn new(config: FlushConfig, sink: S) -> Result<Self, SourceExtractorError> {
        let extractor = SourceExtractor::from_pattern(config.source_regex.as_deref())?;
        Ok(Self {
            config,
            extractor,
            counters: MonotonicCounters::new(),
            sink,
        })
    }

    /// Replaces the source extractor, for instance with a [`SourceExtractor::function`].
    pub fn with_extractor(mut self, extractor: SourceExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Returns the sink batches are submitted to.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the monotonic counter totals.
    pub fn counters(&self) -> &MonotonicCounters {
        &self.counters
    }

    /// Returns the time measurements of a flush at `timestamp` are reported at.
    pub fn measure_time(&self, timestamp: UnixTimestamp) -> UnixTimestamp {
        timestamp.snap(self.config.snap_interval())
    }

    /// Converts a snapshot into batches and submits them.
    ///
    /// Metrics are processed in the order counters, timers, gauges, sets. Metrics in the internal
    /// namespace are skipped if configured. Delivery failures never surface here.
    pub fn flush(&self, timestamp: UnixTimestamp, metrics: &MetricsSnapshot) -> FlushReport {
        let measure_time = self.measure_time(timestamp);
        let mut accumulator = MeasureAccumulator::new(
            &self.sink,
            &self.extractor,
            &self.counters,
            self.config.counters_as_gauges,
            self.config.batch_size,
            measure_time,
        );

        for (name, &delta) in &metrics.counters {
            if !self.is_internal(name) {
                accumulator.add_counter(name, delta);
            }
        }

        for (name, samples) in &metrics.timers {
            if samples.is_empty() || self.is_internal(name) {
                continue;
            }

            let mut sorted = samples.clone();
            sorted.sort_by(f64::total_cmp);

            let full_suffix = self.config.always_suffix_percentile.then_some("100");
            if let Some(measurement) = summarize(name, &sorted, 100.0, full_suffix) {
                accumulator.add(MeasureKind::Gauge, measurement, true);
            }

            for &percentile in &metrics.percentiles {
                let suffix = percentile_suffix(percentile);
                if full_suffix == Some(suffix.as_str()) {
                    continue;
                }

                if let Some(measurement) = summarize(name, &sorted, percentile, Some(&suffix)) {
                    accumulator.add(MeasureKind::Gauge, measurement, false);
                }
            }

            let histogram = metrics
                .timer_data
                .get(name)
                .and_then(|data| data.histogram.as_ref());

            for (bin, &count) in histogram.into_iter().flatten() {
                let measurement = Measurement::value(format!("{name}.{bin}"), count);
                accumulator.add(MeasureKind::Gauge, measurement, false);
            }
        }

        for (name, &value) in &metrics.gauges {
            if !self.is_internal(name) {
                accumulator.add(MeasureKind::Gauge, Measurement::value(name, value), true);
            }
        }

        for (name, members) in &metrics.sets {
            if !self.is_internal(name) {
                let cardinality = members.len() as f64;
                accumulator.add(MeasureKind::Gauge, Measurement::value(name, cardinality), true);
            }
        }

        let num_stats = accumulator.num_stats();
        if self.config.skip_internal_metrics {
            accumulator.add_counter(NUM_STATS_NAME, num_stats as f64);
        }

        let batches = accumulator.finish();
        siphon_log::debug!(
            measure_time = measure_time.as_secs(),
            num_stats,
            batches,
            "flushed metrics"
        );

        FlushReport {
            measure_time,
            num_stats,
            batches,
        }
    }

    /// Metrics under the internal prefix and the name of the synthetic `numStats` counter are
    /// reserved while internal metrics are skipped.
    fn is_internal(&self, name: &str) -> bool {
        self.config.skip_internal_metrics
            && (name == NUM_STATS_NAME || name.starts_with(&self.config.internal_prefix))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use parking_lot::Mutex;

    use super::*;
    use crate::{Batch, TimerData};

    #[derive(Debug, Default)]
    struct RecordingSink(Mutex<Vec<Batch>>);

    impl RecordingSink {
        fn take(&self) -> Vec<Batch> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl BatchSink for RecordingSink {
        fn submit(&self, batch: Batch) {
            self.0.lock().push(batch);
        }
    }

    fn flusher(config: FlushConfig) -> Flusher<RecordingSink> {
        Flusher::new(config, RecordingSink::default()).unwrap()
    }

    fn names(measurements: &[Measurement]) -> Vec<&str> {
        measurements.iter().map(Measurement::name).collect()
    }

    fn ts(secs: u64) -> UnixTimestamp {
        UnixTimestamp::from_secs(secs)
    }

    #[test]
    fn test_flush_order() {
        siphon_test::setup();

        let flusher = flusher(FlushConfig::default());
        let metrics = MetricsSnapshot {
            counters: BTreeMap::from([("hits".to_owned(), 3.0)]),
            gauges: BTreeMap::from([("load".to_owned(), 0.5)]),
            sets: BTreeMap::from([("users".to_owned(), BTreeSet::from(["a".to_owned()]))]),
            timers: BTreeMap::from([("latency".to_owned(), vec![2.0, 1.0])]),
            ..Default::default()
        };

        let report = flusher.flush(ts(105), &metrics);
        assert_eq!(
            report,
            FlushReport {
                measure_time: ts(100),
                num_stats: 4,
                batches: 1,
            }
        );

        let batches = flusher.sink().take();
        assert_eq!(
            names(&batches[0].gauges),
            ["hits", "latency", "load", "users", "numStats"]
        );
        assert_eq!(batches[0].gauges[4], Measurement::value("numStats", 4.0));
        assert!(batches[0].counters.is_empty());
    }

    #[test]
    fn test_snap_disabled() {
        let flusher = flusher(FlushConfig {
            snap_time: Some(0),
            ..Default::default()
        });

        let report = flusher.flush(ts(105), &MetricsSnapshot::default());
        assert_eq!(report.measure_time, ts(105));
    }

    #[test]
    fn test_timer_percentiles_and_histogram() {
        let flusher = flusher(FlushConfig {
            skip_internal_metrics: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            timers: BTreeMap::from([(
                "latency".to_owned(),
                vec![50.0, 10.0, 40.0, 20.0, 30.0],
            )]),
            timer_data: BTreeMap::from([(
                "latency".to_owned(),
                TimerData {
                    histogram: Some(BTreeMap::from([
                        ("bin_100".to_owned(), 5.0),
                        ("bin_inf".to_owned(), 0.0),
                    ])),
                },
            )]),
            percentiles: vec![50.0, 99.9],
            ..Default::default()
        };

        let report = flusher.flush(ts(0), &metrics);
        assert_eq!(report.num_stats, 1);

        let batches = flusher.sink().take();
        insta::assert_debug_snapshot!(batches[0].gauges, @r###"
        [
            Aggregate {
                name: "latency",
                count: 5,
                sum: 150.0,
                sum_squares: 5500.0,
                min: 10.0,
                max: 50.0,
                source: None,
            },
            Aggregate {
                name: "latency.50",
                count: 2,
                sum: 90.0,
                sum_squares: 4100.0,
                min: 40.0,
                max: 50.0,
                source: None,
            },
            Aggregate {
                name: "latency.99.9",
                count: 5,
                sum: 150.0,
                sum_squares: 5500.0,
                min: 10.0,
                max: 50.0,
                source: None,
            },
            Value {
                name: "latency.bin_100",
                value: 5.0,
                source: None,
            },
            Value {
                name: "latency.bin_inf",
                value: 0.0,
                source: None,
            },
        ]
        "###);
        assert!(batches[0].counters.is_empty());
    }

    #[test]
    fn test_always_suffix_percentile() {
        let flusher = flusher(FlushConfig {
            always_suffix_percentile: true,
            skip_internal_metrics: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            timers: BTreeMap::from([("latency".to_owned(), vec![1.0])]),
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(names(&batches[0].gauges), ["latency.100"]);
    }

    #[test]
    fn test_always_suffix_with_configured_full_percentile() {
        let flusher = flusher(FlushConfig {
            always_suffix_percentile: true,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            timers: BTreeMap::from([("t".to_owned(), vec![1.0])]),
            percentiles: vec![100.0, 90.0],
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(names(&batches[0].gauges), ["t.100", "t.90", "numStats"]);
    }

    #[test]
    fn test_full_percentile_without_suffix_kept() {
        let flusher = flusher(FlushConfig::default());
        let metrics = MetricsSnapshot {
            timers: BTreeMap::from([("t".to_owned(), vec![1.0])]),
            percentiles: vec![100.0],
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(names(&batches[0].gauges), ["t", "t.100", "numStats"]);
    }

    #[test]
    fn test_empty_timer_skipped() {
        let flusher = flusher(FlushConfig::default());
        let metrics = MetricsSnapshot {
            timers: BTreeMap::from([("latency".to_owned(), vec![])]),
            ..Default::default()
        };

        let report = flusher.flush(ts(0), &metrics);
        assert_eq!(report.num_stats, 0);

        let batches = flusher.sink().take();
        assert_eq!(names(&batches[0].gauges), ["numStats"]);
    }

    #[test]
    fn test_set_cardinality() {
        let flusher = flusher(FlushConfig::default());
        let members = ["a", "b", "c", "d"].map(str::to_owned);
        let metrics = MetricsSnapshot {
            sets: BTreeMap::from([("users".to_owned(), BTreeSet::from(members))]),
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(batches[0].gauges[0], Measurement::value("users", 4.0));
    }

    #[test]
    fn test_skip_internal_metrics() {
        let flusher = flusher(FlushConfig::default());
        let metrics = MetricsSnapshot {
            counters: BTreeMap::from([
                ("statsd.bad_lines_seen".to_owned(), 1.0),
                ("statsd.packets_received".to_owned(), 10.0),
                ("hits".to_owned(), 1.0),
            ]),
            gauges: BTreeMap::from([("statsd.timestamp_lag".to_owned(), 0.0)]),
            timers: BTreeMap::from([("statsd.flush_time".to_owned(), vec![1.0])]),
            ..Default::default()
        };

        let report = flusher.flush(ts(0), &metrics);
        assert_eq!(report.num_stats, 1);

        for batch in flusher.sink().take() {
            for measurement in batch.gauges.iter().chain(&batch.counters) {
                assert!(!measurement.name().starts_with("statsd."));
            }
        }
    }

    #[test]
    fn test_keep_internal_metrics() {
        let flusher = flusher(FlushConfig {
            skip_internal_metrics: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            counters: BTreeMap::from([("statsd.bad_lines_seen".to_owned(), 1.0)]),
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(names(&batches[0].gauges), ["statsd.bad_lines_seen"]);
        assert!(batches[0].counters.is_empty());
    }

    #[test]
    fn test_monotonic_counters_across_flushes() {
        let flusher = flusher(FlushConfig {
            counters_as_gauges: false,
            ..Default::default()
        });

        for (secs, delta) in [(10, 5.0), (20, 7.0)] {
            let metrics = MetricsSnapshot {
                counters: BTreeMap::from([("k".to_owned(), delta)]),
                ..Default::default()
            };
            flusher.flush(ts(secs), &metrics);
        }

        let values: Vec<_> = flusher
            .sink()
            .take()
            .iter()
            .flat_map(|batch| &batch.counters)
            .filter(|m| m.name() == "k")
            .cloned()
            .collect();
        assert_eq!(
            values,
            [Measurement::value("k", 5.0), Measurement::value("k", 12.0)]
        );

        // numStats is a monotonic counter as well.
        let num_stats = flusher.counters().get(NUM_STATS_NAME).unwrap();
        assert_eq!(num_stats.value, 2.0);
        assert_eq!(num_stats.last_update, ts(20));
    }

    #[test]
    fn test_user_num_stats_counter_reserved() {
        let flusher = flusher(FlushConfig {
            counters_as_gauges: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            counters: BTreeMap::from([
                (NUM_STATS_NAME.to_owned(), 100.0),
                ("hits".to_owned(), 1.0),
            ]),
            ..Default::default()
        };

        let report = flusher.flush(ts(0), &metrics);
        assert_eq!(report.num_stats, 1);

        let batches = flusher.sink().take();
        assert_eq!(
            batches[0].counters,
            [
                Measurement::value("hits", 1.0),
                Measurement::value(NUM_STATS_NAME, 1.0),
            ]
        );
        assert_eq!(flusher.counters().get(NUM_STATS_NAME).unwrap().value, 1.0);
    }

    #[test]
    fn test_user_num_stats_kept_with_internal_metrics() {
        let flusher = flusher(FlushConfig {
            skip_internal_metrics: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            gauges: BTreeMap::from([(NUM_STATS_NAME.to_owned(), 100.0)]),
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(batches[0].gauges, [Measurement::value(NUM_STATS_NAME, 100.0)]);
    }

    #[test]
    fn test_batch_boundary_preserves_order() {
        let flusher = flusher(FlushConfig {
            batch_size: 2,
            skip_internal_metrics: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            counters: BTreeMap::from([("c1".to_owned(), 1.0), ("c2".to_owned(), 1.0)]),
            gauges: BTreeMap::from([("g1".to_owned(), 1.0), ("g2".to_owned(), 1.0)]),
            sets: BTreeMap::from([("s1".to_owned(), BTreeSet::new())]),
            ..Default::default()
        };

        let report = flusher.flush(ts(0), &metrics);
        assert_eq!(report.batches, 3);

        let batches = flusher.sink().take();
        let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, [2, 2, 1]);

        let order: Vec<_> = batches.iter().flat_map(|b| names(&b.gauges)).collect();
        assert_eq!(order, ["c1", "c2", "g1", "g2", "s1"]);
    }

    #[test]
    fn test_source_regex() {
        let flusher = flusher(FlushConfig {
            source_regex: Some(r"host-(\w+)".to_owned()),
            skip_internal_metrics: false,
            ..Default::default()
        });
        let metrics = MetricsSnapshot {
            gauges: BTreeMap::from([("myapp.host-abc123.cpu".to_owned(), 0.5)]),
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(
            batches[0].gauges,
            [Measurement::Value {
                name: "myapp..cpu".to_owned(),
                value: 0.5,
                source: Some("abc123".to_owned()),
            }]
        );
    }

    #[test]
    fn test_function_extractor_takes_priority() {
        let extractor = SourceExtractor::function(
            |raw| raw.replace("web1.", ""),
            |raw| raw.split('.').next().map(str::to_owned),
        );
        let flusher = flusher(FlushConfig {
            source_regex: Some("(never)".to_owned()),
            skip_internal_metrics: false,
            ..Default::default()
        })
        .with_extractor(extractor);

        let metrics = MetricsSnapshot {
            gauges: BTreeMap::from([("web1.load".to_owned(), 1.0)]),
            ..Default::default()
        };

        flusher.flush(ts(0), &metrics);
        let batches = flusher.sink().take();
        assert_eq!(batches[0].gauges[0].name(), "load");
        assert_eq!(batches[0].gauges[0].source(), Some("web1"));
    }

    #[test]
    fn test_invalid_source_regex() {
        let config = FlushConfig {
            source_regex: Some("(".to_owned()),
            ..Default::default()
        };
        assert!(Flusher::new(config, RecordingSink::default()).is_err());
    }
}
