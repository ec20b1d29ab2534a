use anyhow::anyhow;
use clap::{Parser, ValueEnum};
use sonar_core::defaults;
use std::time::Duration;

/// The default log filter used with `--verbose`.
pub const DEFAULT_LOG_FILTER: &str = "sonar=debug,sonar_core=debug";

/// Send `ICMP` echo requests to a host and report round trip times
#[derive(Parser, Debug)]
#[command(name = "sonar", author, version, about, long_about = None)]
pub struct Args {
    /// The hostname or IPv4 address to ping
    pub host: String,

    /// The delay between a reply (or timeout) and the next request [default: 1s]
    #[arg(short = 'i', long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// How long to wait for each reply [default: 5s]
    #[arg(short = 'w', long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Stop after sending this many requests [default: unlimited]
    #[arg(short = 'c', long)]
    pub count: Option<usize>,

    /// Ignore suspend (SIGUSR1) and resume (SIGUSR2) notifications
    #[arg(long, default_value_t = false)]
    pub ignore_lifecycle: bool,

    /// The debug log format [default: compact]
    #[arg(value_enum, long)]
    pub log_format: Option<LogFormat>,

    /// The debug log filter [default: sonar=debug,sonar_core=debug]
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Enable verbose debug logging
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// How to format log data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// Display log data in a compact format.
    Compact,
    /// Display log data in a pretty format.
    Pretty,
}

/// Fully parsed and validated configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SonarConfig {
    pub host: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub count: Option<usize>,
    pub track_app_lifecycle: bool,
    pub verbose: bool,
    pub log_format: LogFormat,
    pub log_filter: String,
}

impl TryFrom<Args> for SonarConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        let interval = args.interval.unwrap_or(defaults::DEFAULT_PROBE_INTERVAL);
        let timeout = args.timeout.unwrap_or(defaults::DEFAULT_TIMEOUT);
        validate_duration("interval", interval)?;
        validate_duration("timeout", timeout)?;
        validate_count(args.count)?;
        Ok(Self {
            host: args.host,
            interval,
            timeout,
            count: args.count,
            track_app_lifecycle: !args.ignore_lifecycle,
            verbose: args.verbose,
            log_format: args.log_format.unwrap_or(LogFormat::Compact),
            log_filter: args
                .log_filter
                .unwrap_or_else(|| String::from(DEFAULT_LOG_FILTER)),
        })
    }
}

fn validate_duration(name: &str, value: Duration) -> anyhow::Result<()> {
    if value.is_zero() {
        Err(anyhow!("{name} ({value:?}) must be greater than zero"))
    } else {
        Ok(())
    }
}

fn validate_count(count: Option<usize>) -> anyhow::Result<()> {
    match count {
        Some(0) => Err(anyhow!("count (0) must be greater than zero")),
        _ => Ok(()),
    }
}

fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    Ok(humantime::parse_duration(value)?)
}
