//! The Siphon binary forwards statsd metrics snapshots to the Librato metrics API.
//!
//! # Usage
//!
//! ```text
//! $ siphon --config .siphon flush snapshot.json
//! ```
//!
//! The snapshot is the JSON document a statsd daemon hands to its backends at every flush. Siphon
//! converts it into measurements, submits them in batches and waits until every batch has been
//! delivered or dropped.
//!
//! # Configuration
//!
//! Configuration is read from `config.yml` in the config folder, `.siphon` by default. Credentials
//! and a few other options can also be given on the command line or through `SIPHON_*`
//! environment variables. Run `siphon config show` to print the effective configuration.

mod cli;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            siphon_log::ensure_error(&*err);
            1
        }
    };

    process::exit(exit_code);
}
