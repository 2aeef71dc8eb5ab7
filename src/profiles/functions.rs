//! The impls and functions
//!
use std::{collections::HashSet, fmt, path::{Component, Path}, str::FromStr, sync::Arc, time::Instant};
use log::*;
use reqwest::Url;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use crate::error::ProfileError;
use crate::profiles::{CollectedProfiles, Collector, CollectorConfig, ProfileKinds, ProfileRequest};
use crate::utility;
use crate::{DEFAULT_PATH_PREFIX, DEFAULT_TIMEOUT};

impl ProfileRequest {
    pub fn new(
        name: &str,
        query: Option<&str>,
    ) -> Result<Self, ProfileError>
    {
        let request = ProfileRequest {
            name: name.to_string(),
            query: query.map(|q| q.to_string()),
        };
        request.validate()?;
        Ok(request)
    }
    pub fn validate(&self) -> Result<(), ProfileError>
    {
        check_profile_name(&self.name)
            .map_err(|reason| ProfileError::InvalidProfile { request: self.to_string(), reason: reason.to_string() })
    }
}

/// A profile name is used as a file name, so it has to be a single, plain path component.
pub fn check_profile_name(name: &str) -> Result<(), &'static str>
{
    if name.is_empty() {
        Err("profile name is empty")
    } else if name.contains('/') || name.contains('\\') {
        Err("profile name cannot contain a path separator")
    } else if name == "." || name == ".." {
        Err("profile name cannot be a relative directory")
    } else if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
        Err("profile name cannot contain whitespace or control characters")
    } else if !matches!(Path::new(name).components().collect::<Vec<_>>().as_slice(), [Component::Normal(_)]) {
        Err("profile name has to be a single file name")
    } else {
        Ok(())
    }
}

impl FromStr for ProfileRequest {
    type Err = ProfileError;

    fn from_str(request: &str) -> Result<Self, Self::Err>
    {
        match request.split_once('?') {
            Some((name, query)) => ProfileRequest::new(name, Some(query)),
            None => ProfileRequest::new(request, None),
        }
    }
}

impl fmt::Display for ProfileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.query {
            Some(query) => write!(f, "{}?{}", self.name, query),
            None => write!(f, "{}", self.name),
        }
    }
}

impl ProfileKinds {
    pub fn new() -> Self { Default::default() }
    /// The profiles served by the Go runtime, plus `cpu` as an alias for `profile`.
    pub fn standard() -> Self
    {
        let mut kinds = ProfileKinds::new();
        for name in ["allocs", "block", "cmdline", "goroutine", "heap", "mutex", "profile", "threadcreate", "trace"] {
            kinds.add(name, name);
        }
        kinds.add("cpu", "profile");
        kinds
    }
    pub fn add(
        &mut self,
        name: &str,
        path_suffix: &str,
    )
    {
        self.kinds.insert(name.to_string(), path_suffix.to_string());
    }
    pub fn path_suffix(
        &self,
        name: &str,
    ) -> Option<&str>
    {
        self.kinds.get(name).map(|suffix| suffix.as_str())
    }
    pub fn names(&self) -> Vec<&str>
    {
        self.kinds.keys().map(|name| name.as_str()).collect()
    }
}

impl CollectedProfiles {
    pub fn new() -> Self { Default::default() }
    pub fn insert(
        &mut self,
        name: String,
        content: Vec<u8>,
    )
    {
        self.profiles.insert(name, content);
    }
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&[u8]>
    {
        self.profiles.get(name).map(|content| content.as_slice())
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)>
    {
        self.profiles.iter()
    }
    pub fn names(&self) -> Vec<&str>
    {
        let mut names: Vec<&str> = self.profiles.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        names
    }
    pub fn len(&self) -> usize { self.profiles.len() }
    pub fn is_empty(&self) -> bool { self.profiles.is_empty() }
}

impl Default for CollectorConfig {
    fn default() -> Self
    {
        CollectorConfig {
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            allowlist: None,
            fail_on_status: false,
        }
    }
}

impl Collector {
    pub fn new(config: CollectorConfig) -> reqwest::Result<Self>
    {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Collector { client, config: Arc::new(config) })
    }
    pub fn config(&self) -> &CollectorConfig
    {
        &self.config
    }
    /// Collect the requested profiles from `base_url`.
    ///
    /// All requests are validated before the first request is sent. A validation error is returned
    /// as-is, independent of `ignore_network_errors`.
    ///
    /// You can add query parameters to a profile like so:
    /// `collector.collect(&cancel, "http://localhost:8080", &["trace?seconds=5".parse()?], false)`
    pub async fn collect(
        &self,
        cancel: &CancellationToken,
        base_url: &str,
        requests: &[ProfileRequest],
        ignore_network_errors: bool,
    ) -> Result<CollectedProfiles, ProfileError>
    {
        info!("[{}] begin collect", base_url);
        let timer = Instant::now();

        let mut seen = HashSet::new();
        let mut paths = Vec::with_capacity(requests.len());
        for request in requests {
            request.validate()?;
            if !seen.insert(request.name.as_str()) {
                return Err(ProfileError::DuplicateProfile { profile: request.name.clone() });
            }
            paths.push(self.request_path(request)?);
        }

        let mut downloads = Vec::with_capacity(requests.len());
        for (request, path) in requests.iter().zip(paths) {
            match build_url(base_url, &path, &request.name) {
                Ok(url) => downloads.push((request.name.clone(), url)),
                Err(error) if ignore_network_errors => warn!("[{}] skipping {}: {}", base_url, request.name, error),
                Err(error) => return Err(error),
            }
        }

        let token = cancel.child_token();
        let (tx, mut rx) = mpsc::channel(downloads.len().max(1));
        let mut workers = JoinSet::new();

        for (name, url) in downloads {
            let tx = tx.clone();
            let token = token.clone();
            let client = self.client.clone();
            let host = base_url.to_string();
            let fail_on_status = self.config.fail_on_status;
            workers.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ProfileError::Cancelled),
                    result = fetch_profile(&client, url, &host, &name, fail_on_status) => result,
                };
                // the receiver is gone when another download failed first
                let _ = tx.send((name, result)).await;
            });
        }
        drop(tx);

        let mut collected = CollectedProfiles::new();
        let mut failure = None;
        while let Some((name, result)) = rx.recv().await {
            match result {
                Ok(content) => collected.insert(name, content),
                Err(error) if ignore_network_errors && error.is_ignorable() => {
                    warn!("[{}] skipping {}: {}", base_url, name, error);
                },
                Err(error) => {
                    token.cancel();
                    failure = Some(error);
                    break;
                },
            }
        }
        drop(rx);
        utility::join_workers(&mut workers).await;

        if let Some(error) = failure {
            info!("[{}] end collect, failed: {:?}", base_url, timer.elapsed());
            return Err(error);
        }
        info!("[{}] end collect, {} of {} profiles: {:?}", base_url, collected.len(), requests.len(), timer.elapsed());
        Ok(collected)
    }
    /// The path after the host base url: prefix, path suffix and the verbatim query.
    fn request_path(
        &self,
        request: &ProfileRequest,
    ) -> Result<String, ProfileError>
    {
        let suffix = match &self.config.allowlist {
            Some(kinds) => kinds.path_suffix(&request.name)
                .ok_or_else(|| ProfileError::UnknownProfile { profile: request.name.clone(), known: kinds.names().join("/") })?,
            None => request.name.as_str(),
        };
        let prefix = self.config.path_prefix.trim_matches('/');
        let mut path = if prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{}", prefix, suffix)
        };
        if let Some(query) = &request.query {
            path.push('?');
            path.push_str(query);
        }
        Ok(path)
    }
}

fn build_url(
    base_url: &str,
    path: &str,
    profile: &str,
) -> Result<Url, ProfileError>
{
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
    // Url::parse silently strips tabs and newlines, reject them here.
    if url.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ProfileError::BuildUrl { profile: profile.to_string(), reason: format!("{:?} contains whitespace or control characters", url) });
    }
    Url::parse(&url)
        .map_err(|e| ProfileError::BuildUrl { profile: profile.to_string(), reason: format!("{:?}: {}", url, e) })
}

async fn fetch_profile(
    client: &reqwest::Client,
    url: Url,
    host: &str,
    profile: &str,
    fail_on_status: bool,
) -> Result<Vec<u8>, ProfileError>
{
    info!("[{}] collecting {}", host, profile);
    let response = client.get(url.clone())
        .send()
        .await
        .map_err(|source| ProfileError::Download { profile: profile.to_string(), source })?;

    let status = response.status();
    if status.is_success() {
        debug!("Success response: {} = {}", url, status);
    } else if fail_on_status {
        return Err(ProfileError::Status { profile: profile.to_string(), status });
    } else {
        debug!("Non success response: {} = {}", url, status);
    }

    let content = response.bytes()
        .await
        .map_err(|source| ProfileError::Download { profile: profile.to_string(), source })?;

    info!("[{}] successfully collected {}", host, profile);
    Ok(content.to_vec())
}
