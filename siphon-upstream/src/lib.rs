//! Delivery of measurement batches to the Librato metrics API.
//!
//! The [`UpstreamClient`] implements [`BatchSink`](siphon_metrics::BatchSink), so it can be
//! handed directly to a [`Flusher`](siphon_metrics::Flusher). Every submitted batch is delivered
//! on its own background task:
//!
//! 1. The batch is serialized into a JSON payload together with the configured default source.
//! 2. The payload is posted to `/v1/metrics` with Basic authentication.
//! 3. Server errors and connection failures are retried exactly once after the configured delay.
//!    Client errors and timeouts are never retried.
//!
//! Outcomes are only logged. The [`FlushStats`] record when requests were last dispatched and
//! when a batch was last dropped.
#![warn(missing_docs)]

mod client;
mod delivery;
mod error;
mod payload;
mod stats;

pub use self::client::*;
pub use self::delivery::*;
pub use self::error::*;
pub use self::payload::*;
pub use self::stats::*;
