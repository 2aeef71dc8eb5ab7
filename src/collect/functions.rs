//! The impls and functions
//!
use std::{path::{Path, PathBuf}, sync::Arc, time::Instant};
use log::*;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use crate::collect::RunConfig;
use crate::dump::{dump, HostAddress};
use crate::error::{ErrorKind, ProfileError};
use crate::profiles::{Collector, ProfileRequest};
use crate::utility;
use crate::{DEFAULT_DIRECTORY, DEFAULT_INTERVAL, DEFAULT_PROFILES};

impl Default for RunConfig {
    fn default() -> Self
    {
        RunConfig {
            hosts: Vec::new(),
            profiles: DEFAULT_PROFILES.iter()
                .map(|name| ProfileRequest { name: name.to_string(), query: None })
                .collect(),
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            keep_going: false,
            looping: false,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Collect and dump the profiles of all hosts concurrently, one task per host.
///
/// Returns the number of profiles written. The first host that fails cancels the other hosts,
/// and its error is returned.
pub async fn collect_and_dump(
    collector: &Collector,
    cancel: &CancellationToken,
    directory: &Path,
    hosts: &[String],
    requests: &[ProfileRequest],
    ignore_network_errors: bool,
) -> Result<usize, ProfileError>
{
    info!("begin collect and dump");
    let timer = Instant::now();

    for host in hosts {
        HostAddress::parse(host)?;
    }

    let token = cancel.child_token();
    let requests: Arc<[ProfileRequest]> = requests.into();
    let directory: Arc<Path> = directory.into();
    let mut tasks = JoinSet::new();

    for host in hosts {
        let collector = collector.clone();
        let token = token.clone();
        let requests = requests.clone();
        let directory = directory.clone();
        let host = host.clone();
        tasks.spawn(async move {
            let collected = collector.collect(&token, &host, &requests, ignore_network_errors).await?;
            dump(&token, &directory, &host, &collected).await?;
            Ok::<usize, ProfileError>(collected.len())
        });
    }

    let mut written = 0;
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(error) => {
                utility::resume_panic(error);
                continue;
            },
        };
        match result {
            Ok(count) => written += count,
            // the hosts cancelled because of the first failure report Cancelled
            Err(_) if failure.is_some() => {},
            Err(error) => {
                token.cancel();
                failure = Some(error);
            },
        }
    }

    info!("end collect and dump: {:?}", timer.elapsed());
    match failure {
        Some(error) => Err(error),
        None => Ok(written),
    }
}

/// Run one collect and dump pass, or keep running passes until `cancel` fires when looping.
///
/// Cancellation is a clean stop and returns `Ok`. In loop mode a failed pass is logged and the
/// next pass is attempted, except for validation errors, which cannot succeed on a retry.
pub async fn run(
    collector: &Collector,
    cancel: &CancellationToken,
    config: &RunConfig,
) -> Result<(), ProfileError>
{
    let mut pass: u64 = 0;
    loop {
        pass += 1;
        match collect_and_dump(collector, cancel, &config.directory, &config.hosts, &config.profiles, config.keep_going).await {
            Ok(written) => info!("pass {}: wrote {} profiles for {} hosts", pass, written, config.hosts.len()),
            Err(error) if error.is_cancelled() => {
                info!("collection cancelled, stopping");
                return Ok(());
            },
            Err(error) if !config.looping || error.kind() == ErrorKind::Validation => return Err(error),
            Err(error) => error!("pass {} failed: {}", pass, error),
        }

        if !config.looping {
            return Ok(());
        }

        info!("sleeping for {:?} before next collect...", config.interval);
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {},
            _ = cancel.cancelled() => {
                info!("collection cancelled, stopping");
                return Ok(());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::profiles::CollectorConfig;

    #[test]
    fn default_run_config_collects_default_profiles() {
        let config = RunConfig::default();
        let names: Vec<&str> = config.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["allocs", "heap", "goroutine", "profile"]);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(!config.looping);
    }
    #[tokio::test]
    async fn malformed_host_fails_before_collecting() {
        let collector = Collector::new(CollectorConfig::default()).unwrap();
        let root = tempfile::tempdir().unwrap();
        let hosts = vec!["http://localhost:8080\n".to_string()];
        let error = collect_and_dump(&collector, &CancellationToken::new(), root.path(), &hosts, &[], false).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
    #[tokio::test]
    async fn loop_stops_on_validation_error() {
        let collector = Collector::new(CollectorConfig::default()).unwrap();
        let config = RunConfig { hosts: vec!["not a url".to_string()], looping: true, ..Default::default() };
        let error = run(&collector, &CancellationToken::new(), &config).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
    }
    #[tokio::test]
    async fn loop_stops_cleanly_when_cancelled_while_sleeping() {
        let collector = Collector::new(CollectorConfig::default()).unwrap();
        let root = tempfile::tempdir().unwrap();
        let config = RunConfig {
            directory: root.path().to_path_buf(),
            looping: true,
            interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            interrupt.cancel();
        });
        let timer = Instant::now();
        run(&collector, &cancel, &config).await.unwrap();
        assert!(timer.elapsed() < Duration::from_secs(10));
    }
}
