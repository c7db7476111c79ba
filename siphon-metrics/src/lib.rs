//! Conversion of statsd flush snapshots into Librato measurement batches.
//!
//! A statsd backend hands over a [`MetricsSnapshot`] once per flush interval. The [`Flusher`]
//! turns that snapshot into [`Measurement`]s, packs them into [`Batch`]es of bounded size and
//! hands every full batch to a [`BatchSink`], which is usually the upstream HTTP client.
//!
//! # Measurements
//!
//! Every measurement is either a single [`Measurement::Value`] or a
//! [`Measurement::Aggregate`] summary of many samples. Measurements are grouped into gauges and
//! counters, see [`MeasureKind`].
//!
//! Names are passed through [`sanitize`] and optionally split into a name and a source by a
//! [`SourceExtractor`]:
//!
//! ```
//! use siphon_metrics::SourceExtractor;
//!
//! let extractor = SourceExtractor::regex(r"^([^.]+)\.").unwrap();
//! let (name, source) = extractor.extract("web-1.requests");
//!
//! assert_eq!(name, "requests");
//! assert_eq!(source.as_deref(), Some("web-1"));
//! ```
//!
//! # Counters
//!
//! Statsd counters are reported as gauges of the per-interval delta by default. With
//! [`FlushConfig::counters_as_gauges`] disabled, they are instead accumulated into
//! [`MonotonicCounters`] that persist across flushes and are reported as ever-growing counters.
#![warn(missing_docs)]

mod accumulator;
mod config;
mod counters;
mod flush;
mod measurement;
mod percentile;
mod sanitize;
mod snapshot;
mod source;

pub use self::accumulator::*;
pub use self::config::*;
pub use self::counters::*;
pub use self::flush::*;
pub use self::measurement::*;
pub use self::percentile::*;
pub use self::sanitize::*;
pub use self::snapshot::*;
pub use self::source::*;
