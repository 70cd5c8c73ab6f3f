//! Process configuration from command-line flags and environment variables
//!
//! | Flag | Variable | Default |
//! |---|---|---|
//! | `--port` | `DRAIN_DELAY_PORT` | `8080` |
//! | `--kubeconfig` | `DRAIN_DELAY_KUBECONFIG` | in-cluster / default kubeconfig |
//! | `--aws-region` | `DRAIN_DELAY_AWS_REGION` | SDK default chain |
//! | `--aws-profile` | `DRAIN_DELAY_AWS_PROFILE` | SDK default chain |
//! | `--shutdown-timeout` | `DRAIN_DELAY_SHUTDOWN_TIMEOUT_SECONDS` | `60` |
//!
//! Flags win over variables. Single-dash long flags (`-port=9090`,
//! `-kubeconfig /path`) are accepted as well, so existing pod specs keep
//! working.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Long flags that may also be written with a single dash
const LONG_FLAGS: &[&str] = &[
    "port",
    "kubeconfig",
    "aws-region",
    "aws-profile",
    "shutdown-timeout",
];

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "drain-delay")]
#[command(about = "Delays pod termination until its IP has drained from the load balancer", long_about = None)]
pub struct AppConfig {
    /// Port to listen on
    #[arg(long, env = "DRAIN_DELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Explicit kubeconfig file; unset uses the in-cluster config or the
    /// default kubeconfig lookup
    #[arg(long, env = "DRAIN_DELAY_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// AWS region
    #[arg(long, env = "DRAIN_DELAY_AWS_REGION")]
    pub aws_region: Option<String>,

    /// Shared config profile to load AWS credentials from
    #[arg(long, env = "DRAIN_DELAY_AWS_PROFILE")]
    pub aws_profile: Option<String>,

    /// Seconds to wait for in-flight drain requests at shutdown
    #[arg(
        long = "shutdown-timeout",
        env = "DRAIN_DELAY_SHUTDOWN_TIMEOUT_SECONDS",
        value_name = "SECONDS",
        default_value = "60",
        value_parser = parse_seconds
    )]
    pub shutdown_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            kubeconfig: None,
            aws_region: None,
            aws_profile: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Parse the process arguments, falling back to the environment
    pub fn try_load() -> Result<Self, clap::Error> {
        Self::try_from_args(std::env::args_os())
    }

    /// Parse an explicit argument list; the first item is the binary name
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_flags(args))
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| format!("'{}' is not a whole number of seconds", value))
}

/// Rewrite `-port=9090` style flags to `--port=9090`
///
/// Only the known long flags are touched, and nothing after a bare `--`.
fn normalize_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut normalized = Vec::new();
    let mut flags_done = false;

    for arg in args.into_iter().map(Into::into) {
        if flags_done {
            normalized.push(arg);
            continue;
        }
        if arg.as_os_str() == "--" {
            flags_done = true;
            normalized.push(arg);
            continue;
        }
        let rewritten = arg.to_str().and_then(|text| {
            let rest = text.strip_prefix('-')?;
            if rest.starts_with('-') {
                return None;
            }
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            LONG_FLAGS
                .contains(&name)
                .then(|| OsString::from(format!("-{}", text)))
        });
        normalized.push(rewritten.unwrap_or(arg));
    }

    normalized
}
