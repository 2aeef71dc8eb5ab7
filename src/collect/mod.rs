//! Module that drives collecting and dumping over all hosts.
//!
//! Every host gets its own task, which collects the profiles of the host and then dumps them.
//! A pass succeeds when all hosts succeed; the first failing host cancels the others.
//! [run] performs a single pass, or loops with a sleep in between until cancelled.
//!
mod structs;
mod functions;

pub use structs::*;
pub use functions::*;
