//! Module for collecting profiles from the `/debug/pprof` endpoint of a host.
//!
//! The endpoint is served by Go programs that import `net/http/pprof`, but anything serving
//! `GET {host}/debug/pprof/{profile}` works: the body is stored as-is, nothing is parsed.
//!
//! A profile request is a profile name, optionally followed by query parameters:
//! `allocs`, `heap`, `trace?seconds=5`. The query is sent verbatim, the name is used to store the result.
//!
//! Every profile of a host is requested concurrently. Depending on `ignore_network_errors`,
//! a failed download either cancels the other downloads for the host and fails the collection,
//! or is logged and left out of the result.
//!
mod structs;
mod functions;

pub use structs::*;
pub use functions::*;
