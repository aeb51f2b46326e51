//! Construction-time settings for the pooled client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_POOL_SIZE: usize = 20;

pub const CONNECT_TIMEOUT_VAR: &str = "POOL_CONNECT_TIMEOUT_MS";
pub const SOCKET_TIMEOUT_VAR: &str = "POOL_SOCKET_TIMEOUT_MS";
pub const POOL_SIZE_VAR: &str = "POOL_SIZE";

/// Timeouts and pool size for a `PooledHttpClient`.
///
/// `connect_timeout_ms` bounds both TCP connect and the wait for a free pooled
/// connection. `socket_timeout_ms` bounds waiting for the response and reading
/// its body. All connections go to one upstream host, so `pool_size` caps both
/// the total and the per-host connection count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_socket_timeout_ms")]
    pub socket_timeout_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_socket_timeout_ms() -> u64 {
    DEFAULT_SOCKET_TIMEOUT_MS
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl PoolConfig {
    pub fn new(connect_timeout_ms: u64, socket_timeout_ms: u64, pool_size: usize) -> Self {
        Self {
            connect_timeout_ms,
            socket_timeout_ms,
            pool_size,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        Ok(())
    }

    /// Read settings from `POOL_CONNECT_TIMEOUT_MS`, `POOL_SOCKET_TIMEOUT_MS`
    /// and `POOL_SIZE`, falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            connect_timeout_ms: parse_var(&lookup, CONNECT_TIMEOUT_VAR)?
                .unwrap_or(defaults.connect_timeout_ms),
            socket_timeout_ms: parse_var(&lookup, SOCKET_TIMEOUT_VAR)?
                .unwrap_or(defaults.socket_timeout_ms),
            pool_size: parse_var(&lookup, POOL_SIZE_VAR)?.unwrap_or(defaults.pool_size),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            }),
    }
}
