//! Common functionality for Siphon.
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod time;

pub use crate::time::*;
