//! Configuration management for fanlink.
//!
//! All settings come from environment variables and are validated once at
//! startup. A bad value is fatal: the daemon must not start serving commands
//! against an invalid endpoint.

use serde::Serialize;
use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

use crate::{
    retry::RetryPolicy,
    transport::Endpoint,
    validation::{self, ValidationError},
};

/// Appliance address used when `FAN_IP` is unset.
pub const DEFAULT_FAN_IP: &str = "192.168.4.1";
pub const DEFAULT_UDP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const MAX_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
pub const DEFAULT_API_PORT: u16 = 7786;

/// Startup configuration error, naming the offending variable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{var}: {source}")]
    Invalid {
        var: &'static str,
        #[source]
        source: ValidationError,
    },
    #[error("{var}: expected {expected}, got '{value}'")]
    OutOfRange {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// The controlled appliance
    pub endpoint: Endpoint,

    /// Attempts, backoff and per-attempt timeout for every command
    pub retry: RetryPolicy,

    /// HTTP API listen address
    pub api_listen: SocketAddr,

    /// Write logs to this file instead of stdout/journald
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("FAN_PORT").ok_or(ConfigError::Missing("FAN_PORT"))?;
        let port = validation::validate_port_str(&port)
            .map_err(|source| ConfigError::Invalid { var: "FAN_PORT", source })?;

        // The port is already valid, so any endpoint error is the address.
        let ip = lookup("FAN_IP").unwrap_or_else(|| DEFAULT_FAN_IP.to_string());
        let endpoint = Endpoint::new(ip.trim(), port.into())
            .map_err(|source| ConfigError::Invalid { var: "FAN_IP", source })?;

        let timeout_ms = parse_ranged(
            &lookup,
            "UDP_TIMEOUT",
            DEFAULT_UDP_TIMEOUT_MS,
            1..=u64::MAX,
            "a timeout of at least 1 ms",
        )?;
        let attempts = parse_ranged(
            &lookup,
            "UDP_RETRY_ATTEMPTS",
            DEFAULT_RETRY_ATTEMPTS,
            1..=MAX_RETRY_ATTEMPTS,
            "an integer between 1 and 10",
        )?;
        let delay_ms = parse_ranged(
            &lookup,
            "UDP_RETRY_DELAY",
            DEFAULT_RETRY_DELAY_MS,
            0..=u64::MAX,
            "a delay in ms",
        )?;

        let api_listen = match lookup("FANLINK_API_LISTEN") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::OutOfRange {
                var: "FANLINK_API_LISTEN",
                expected: "a socket address such as 127.0.0.1:7786",
                value: raw,
            })?,
            None => SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_API_PORT)),
        };

        let log_file = lookup("FANLINK_LOG_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            endpoint,
            retry: RetryPolicy::new(
                attempts,
                Duration::from_millis(delay_ms),
                Duration::from_millis(timeout_ms),
            ),
            api_listen,
            log_file,
        })
    }
}

// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_ranged<F, N>(
    lookup: &F,
    var: &'static str,
    default: N,
    range: std::ops::RangeInclusive<N>,
    expected: &'static str,
) -> Result<N, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr + PartialOrd,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };

    match raw.trim().parse::<N>() {
        Ok(value) if range.contains(&value) => Ok(value),
        _ => Err(ConfigError::OutOfRange {
            var,
            expected,
            value: raw,
        }),
    }
}
