//! pprof_dump: collect pprof profiles from a set of hosts and store them on disk.
//!
//! Hit Ctrl-C at any time to stop; an interrupted collection is not an error.
//!
use std::collections::HashMap;
use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::*;
use tokio_util::sync::CancellationToken;
use pprof_dump::{utility, Collector, CollectorConfig, ProfileKinds, RunConfig, DEFAULT_PATH_PREFIX};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Opts {
    /// hosts from which profiles will be collected, comma separated, like http://localhost:6060
    #[arg(short = 'u', long, value_name = "url,url")]
    hosts: Option<String>,
    /// profiles to collect, comma separated. Possible options: allocs/block/cmdline/goroutine/heap/mutex/profile/threadcreate/trace, query parameters are allowed: trace?seconds=5
    #[arg(short, long, value_name = "profile,profile")]
    profiles: Option<String>,
    /// collect many times (until Ctrl-C)
    #[arg(short, long = "loop")]
    looping: bool,
    /// interval between collecting (use with --loop), like 60s, 5m
    #[arg(short, long)]
    interval: Option<String>,
    /// directory to put the pprof files in
    #[arg(short, long)]
    directory: Option<String>,
    /// keep going collect profiles if some requests failed
    #[arg(short, long)]
    keep_going: bool,
    /// only allow the profiles the Go runtime provides
    #[arg(long)]
    strict_profiles: bool,
    /// timeout for a single profile request, like 60s
    #[arg(short, long)]
    timeout: Option<String>,
    /// treat a non 2xx response as a failed request
    #[arg(long)]
    fail_on_status: bool,
    /// write the hosts, profiles, directory, interval and timeout settings to .env
    #[arg(long)]
    write_dotenv: bool,
}

#[tokio::main]
async fn main() -> Result<()>
{
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = Opts::parse();

    let mut changed_options = HashMap::new();
    let hosts = utility::set_hosts(&options.hosts, &mut changed_options)?;
    let profiles = utility::set_profiles(&options.profiles, &mut changed_options)?;
    let directory = utility::set_directory(&options.directory, &mut changed_options);
    let interval = utility::set_interval(&options.interval, &mut changed_options)?;
    let timeout = utility::set_timeout(&options.timeout, &mut changed_options)?;
    utility::dotenv_writer(options.write_dotenv, changed_options)?;

    let collector = Collector::new(CollectorConfig {
        path_prefix: DEFAULT_PATH_PREFIX.to_string(),
        timeout,
        allowlist: options.strict_profiles.then(ProfileKinds::standard),
        fail_on_status: options.fail_on_status,
    }).with_context(|| "Cannot create http client")?;

    let config = RunConfig {
        hosts,
        profiles,
        directory,
        keep_going: options.keep_going,
        looping: options.looping,
        interval,
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            interrupt.cancel();
        }
    });

    info!("collecting profiles. hit Ctrl-C any time to stop.");
    pprof_dump::run(&collector, &cancel, &config).await?;
    Ok(())
}
