//! Helpers for testing the forwarder and its upstream client.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output is
//!    captured by the test runner. All logs emitted with [`siphon_log`] will show up for test
//!    failures or when run with `--nocapture`.
//!  - Tests that talk HTTP start a [`MockUpstream`] and point the client at its
//!    [`url`](MockUpstream::url).
//!
//! # Example
//!
//! ```no_run
//! #[test]
//! fn my_test() {
//!     siphon_test::setup();
//!
//!     siphon_log::debug!("hello, world!");
//! }
//! ```

mod upstream;

pub use self::upstream::*;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from Siphon crates and mutes all other logs.
pub fn setup() {
    siphon_log::init_test!();
}
