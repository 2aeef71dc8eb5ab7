//! Module for writing collected profiles to disk.
//!
//! Every profile is written as a file named after the profile, in this directory structure:
//! - provided directory
//!   - host:port
//!     - YYYY MM DD
//!       - HH MM SS
//!         - profile
//!
//! The timestamp is taken when the profiles are written, not when the collection started.
//!
mod functions;

pub use functions::*;
