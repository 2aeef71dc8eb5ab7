//! The structs
//!
use std::{collections::{BTreeMap, HashMap}, sync::Arc, time::Duration};

/// A single requested profile, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    /// The part before the first `?`. This is the name the profile is stored under.
    pub name: String,
    /// The part after the first `?`, sent to the endpoint verbatim.
    pub query: Option<String>,
}
/// The allowlist used in strict mode: canonical profile name to request path suffix.
#[derive(Debug, Clone, Default)]
pub struct ProfileKinds {
    pub kinds: BTreeMap<String, String>,
}
/// The profiles collected from one host, by canonical name.
#[derive(Debug, Clone, Default)]
pub struct CollectedProfiles {
    pub profiles: HashMap<String, Vec<u8>>,
}
/// Settings for the [Collector], set once at startup.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Path between the host base url and the profile name, default `debug/pprof`.
    pub path_prefix: String,
    /// Per request timeout, measured from the start of the request.
    pub timeout: Duration,
    /// When set, only the profiles in the allowlist can be requested.
    pub allowlist: Option<ProfileKinds>,
    /// Treat a non 2xx response as a failed download.
    pub fail_on_status: bool,
}
/// Collects profiles over HTTP.
///
/// The HTTP client and the configuration are read-only and shared by all collections,
/// so a [Collector] can be cloned cheaply into every host task.
#[derive(Debug, Clone)]
pub struct Collector {
    pub(crate) client: reqwest::Client,
    pub(crate) config: Arc<CollectorConfig>,
}
