//! Configuration for the Siphon CLI and forwarder.
//!
//! The configuration lives in a folder, `.siphon` by default, that contains a `config.yml`. All
//! sections and keys are optional and fall back to their defaults:
//!
//! ```yaml
//! upstream:
//!   api: https://metrics-api.librato.com/
//!   email: ops@example.com
//!   token: 75AFDB82
//!   timeout: 4
//!   retry_delay: 5
//! metrics:
//!   source_regex: '^([^.]+)\.'
//!   counters_as_gauges: false
//! logging:
//!   level: debug
//! ```
#![warn(missing_docs)]

mod config;
mod upstream;

pub use crate::config::*;
pub use crate::upstream::*;
