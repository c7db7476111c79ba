//! Logging for the Siphon metrics forwarder.
//!
//! All crates in the workspace log through the macros re-exported here: [`error!`], [`warn!`],
//! [`info!`], [`debug!`] and [`trace!`]. They are the `tracing` macros, so both format strings
//! and structured fields work.
//!
//! ```
//! siphon_log::debug!(batches = 3, "flushed metrics");
//! ```
//!
//! Messages start lowercase and carry no trailing punctuation. Delivery problems that lose a
//! batch are errors, recoverable upstream trouble is a warning, and per-batch chatter belongs on
//! `debug` or `trace`.
//!
//! # Setup
//!
//! The binary calls [`init`] once with the `logging` section of its configuration. Before that,
//! [`ensure_error`] writes straight to `stderr`. Errors with a chain of causes render through
//! [`LogError`]:
//!
//! ```
//! use siphon_log::LogError;
//!
//! let error = std::io::Error::other("connection reset");
//! siphon_log::warn!("upstream unavailable: {}", LogError(&error));
//! ```
//!
//! Unit tests call [`init_test!`] instead, which captures output through the test harness.

#![warn(missing_docs)]

mod setup;
pub use setup::*;

pub use test::*;

mod utils;
pub use utils::*;

// Expose the minimal log facade.
#[doc(inline)]
pub use tracing::{debug, error, info, trace, warn};
