//! The structs
//!
use std::{path::PathBuf, time::Duration};
use crate::profiles::ProfileRequest;

/// What to collect, from where, where to put it and how often.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Host base urls, like `http://localhost:8080`.
    pub hosts: Vec<String>,
    pub profiles: Vec<ProfileRequest>,
    /// Root of the dump directory tree.
    pub directory: PathBuf,
    /// Leave out profiles that failed to download instead of failing the host.
    pub keep_going: bool,
    /// Collect until cancelled, instead of a single pass.
    pub looping: bool,
    /// Sleep between two passes in loop mode.
    pub interval: Duration,
}
