//! pprof_dump collects runtime profiles (heap, allocations, goroutines, cpu, execution trace)
//! from the pprof HTTP endpoint of a set of hosts, and stores every profile as a file in a
//! timestamped directory per host.
//!
//! - [profiles]: concurrent download of the profiles of one host.
//! - [dump]: writing the downloaded profiles to disk.
//! - [collect]: collect and dump for all hosts, once or in a loop.
//!
use std::time::Duration;

pub mod collect;
pub mod dump;
pub mod error;
pub mod profiles;
pub mod utility;

pub use collect::{collect_and_dump, run, RunConfig};
pub use dump::{dump, dump_folder, write_profiles, HostAddress};
pub use error::{ErrorKind, ProfileError};
pub use profiles::{check_profile_name, CollectedProfiles, Collector, CollectorConfig, ProfileKinds, ProfileRequest};

/// The path the Go `net/http/pprof` package serves the profiles on.
pub const DEFAULT_PATH_PREFIX: &str = "debug/pprof";
pub const DEFAULT_PROFILES: [&str; 4] = ["allocs", "heap", "goroutine", "profile"];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_DIRECTORY: &str = ".";
