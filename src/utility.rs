//! Utilities
//!
//! Options are resolved in this order: command line switch, environment variable (which can be set
//! in `.env`, read at startup via dotenv), built-in default.
//! Options that are set by switch or environment are recorded in `changed_options`,
//! so they can be written to `.env` with `--write-dotenv`.
//!
use std::{collections::HashMap, env, fs, io::Write, path::PathBuf, time::Duration};
use anyhow::{bail, Context, Result};
use log::*;
use tokio::task::{JoinError, JoinSet};
use crate::profiles::ProfileRequest;
use crate::{DEFAULT_DIRECTORY, DEFAULT_INTERVAL, DEFAULT_PROFILES, DEFAULT_TIMEOUT};

fn set_option(
    option: &Option<String>,
    env_key: &'static str,
    changed_options: &mut HashMap<&'static str, String>,
) -> Option<String>
{
    // is the switch set?
    if let Some(value) = option {
        info!("{} argument set: using: {}", env_key, value);
        changed_options.insert(env_key, value.to_string());
        return Some(value.to_string());
    }
    // is the environment variable set (via dotenv().ok())?
    match env::var(env_key) {
        Ok(set_var) => {
            info!("{} not set: set via .env: {}", env_key, set_var);
            changed_options.insert(env_key, set_var.to_owned());
            Some(set_var)
        }
        Err(_e) => None,
    }
}

fn split_list(list: &str) -> Vec<String>
{
    list.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

pub fn set_hosts(
    option: &Option<String>,
    changed_options: &mut HashMap<&'static str, String>,
) -> Result<Vec<String>>
{
    let hosts = match set_option(option, "PPROF_DUMP_HOSTS", changed_options) {
        Some(hosts) => split_list(&hosts),
        None => Vec::new(),
    };
    if hosts.is_empty() {
        bail!("No hosts to collect from: use --hosts or set PPROF_DUMP_HOSTS");
    }
    Ok(hosts)
}

pub fn set_profiles(
    option: &Option<String>,
    changed_options: &mut HashMap<&'static str, String>,
) -> Result<Vec<ProfileRequest>>
{
    match set_option(option, "PPROF_DUMP_PROFILES", changed_options) {
        Some(profiles) => split_list(&profiles)
            .iter()
            .map(|profile| profile.parse::<ProfileRequest>()
                .with_context(|| format!("Invalid profile: {}", profile)))
            .collect(),
        None => {
            info!("profiles not set: using DEFAULT_PROFILES: {}", DEFAULT_PROFILES.join(","));
            Ok(DEFAULT_PROFILES.iter()
                .map(|name| ProfileRequest { name: name.to_string(), query: None })
                .collect())
        }
    }
}

pub fn set_directory(
    option: &Option<String>,
    changed_options: &mut HashMap<&'static str, String>,
) -> PathBuf
{
    match set_option(option, "PPROF_DUMP_DIRECTORY", changed_options) {
        Some(directory) => PathBuf::from(directory),
        None => PathBuf::from(DEFAULT_DIRECTORY),
    }
}

pub fn set_interval(
    option: &Option<String>,
    changed_options: &mut HashMap<&'static str, String>,
) -> Result<Duration>
{
    match set_option(option, "PPROF_DUMP_INTERVAL", changed_options) {
        Some(interval) => parse_duration(&interval).with_context(|| "Invalid interval"),
        None => Ok(DEFAULT_INTERVAL),
    }
}

pub fn set_timeout(
    option: &Option<String>,
    changed_options: &mut HashMap<&'static str, String>,
) -> Result<Duration>
{
    match set_option(option, "PPROF_DUMP_TIMEOUT", changed_options) {
        Some(timeout) => parse_duration(&timeout).with_context(|| "Invalid timeout"),
        None => Ok(DEFAULT_TIMEOUT),
    }
}

/// Parse a duration like `500ms`, `30s`, `1m30s`, `2h`, or a plain number of seconds.
pub fn parse_duration(duration: &str) -> Result<Duration>
{
    let duration = duration.trim();
    let parsed = if !duration.is_empty() && duration.chars().all(|c| c.is_ascii_digit()) {
        Duration::from_secs(duration.parse()
            .with_context(|| format!("Duration {:?} is too large", duration))?)
    } else {
        humantime::parse_duration(duration)
            .with_context(|| format!("Invalid duration {:?}, use a value like 500ms, 60s, 1m30s or 2h", duration))?
    };
    if parsed.is_zero() {
        bail!("Duration {:?} should be larger than zero", duration);
    }
    Ok(parsed)
}

pub fn dotenv_writer(
    write_dotenv: bool,
    changed_options: HashMap<&str, String>,
) -> Result<()>
{
    if !changed_options.is_empty() && write_dotenv {
        info!("Writing .env file");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(".env")
            .with_context(|| "Error writing .env file: .env")?;

        let mut options: Vec<_> = changed_options.into_iter().collect();
        options.sort();
        for (key, value) in options {
            file.write_all(format!("{}={}\n", key, value).as_bytes())?;
            info!("{}={}", key, value);
        }
    }
    Ok(())
}

/// A panic in a task is a bug: pass it on instead of losing it at the join point.
pub(crate) fn resume_panic(error: JoinError)
{
    if error.is_panic() {
        std::panic::resume_unwind(error.into_panic());
    }
}

pub(crate) async fn join_workers(workers: &mut JoinSet<()>)
{
    while let Some(joined) = workers.join_next().await {
        if let Err(error) = joined {
            resume_panic(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration(" 2h ").unwrap(), Duration::from_secs(7200));
    }
    #[test]
    fn parse_duration_compound() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h 5m").unwrap(), Duration::from_secs(3900));
    }
    #[test]
    fn parse_duration_overflow_is_an_error() {
        assert!(parse_duration("99999999999999999h").is_err());
        assert!(parse_duration("99999999999999999999999").is_err());
    }
    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("0s").is_err());
    }
    #[test]
    fn switch_is_recorded_as_changed_option() {
        let mut changed_options = HashMap::new();
        let hosts = set_hosts(&Some("http://a:6060, http://b:6060,".to_string()), &mut changed_options).unwrap();
        assert_eq!(hosts, vec!["http://a:6060", "http://b:6060"]);
        assert_eq!(changed_options.get("PPROF_DUMP_HOSTS").unwrap(), "http://a:6060, http://b:6060,");
    }
    #[test]
    fn profiles_from_switch_keep_query() {
        let mut changed_options = HashMap::new();
        let profiles = set_profiles(&Some("heap,trace?seconds=5".to_string()), &mut changed_options).unwrap();
        assert_eq!(profiles[1].name, "trace");
        assert_eq!(profiles[1].query.as_deref(), Some("seconds=5"));
    }
    #[test]
    fn invalid_profile_from_switch_is_an_error() {
        let mut changed_options = HashMap::new();
        assert!(set_profiles(&Some("heap,a/b".to_string()), &mut changed_options).is_err());
    }
}
