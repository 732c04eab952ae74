//! Service configuration from environment variables.

use std::{net::SocketAddr, str::FromStr, time::Duration};

pub const LISTEN_ADDR_VAR: &str = "VIRTBUS_LISTEN_ADDR";
pub const CONNECT_URI_VAR: &str = "VIRTBUS_CONNECT_URI";
pub const SIGNAL_BACKLOG_VAR: &str = "VIRTBUS_SIGNAL_BACKLOG";
pub const MAX_SIGNAL_WAIT_VAR: &str = "VIRTBUS_MAX_SIGNAL_WAIT_MS";

/// Errors while loading [`ServiceConfig`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Address the HTTP binding listens on.
    pub listen_addr: SocketAddr,
    /// Hypervisor connection URI.
    pub connect_uri: String,
    /// Signals kept for late pollers.
    pub signal_backlog: usize,
    /// Upper bound for one long-poll on the signal journal.
    pub max_signal_wait: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3457)),
            connect_uri: "test:///default".to_owned(),
            signal_backlog: 1024,
            max_signal_wait: Duration::from_millis(30_000),
        }
    }
}

impl ServiceConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source; unset variables keep their
    /// defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = lookup(LISTEN_ADDR_VAR) {
            config.listen_addr = parse(LISTEN_ADDR_VAR, &addr)?;
        }
        if let Some(uri) = lookup(CONNECT_URI_VAR) {
            if uri.trim().is_empty() {
                return Err(invalid(CONNECT_URI_VAR, &uri, "must not be empty"));
            }
            config.connect_uri = uri;
        }
        if let Some(backlog) = lookup(SIGNAL_BACKLOG_VAR) {
            config.signal_backlog = parse(SIGNAL_BACKLOG_VAR, &backlog)?;
            if config.signal_backlog == 0 {
                return Err(invalid(SIGNAL_BACKLOG_VAR, &backlog, "must be at least 1"));
            }
        }
        if let Some(wait) = lookup(MAX_SIGNAL_WAIT_VAR) {
            config.max_signal_wait = Duration::from_millis(parse(MAX_SIGNAL_WAIT_VAR, &wait)?);
        }
        Ok(config)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| invalid(var, value, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { var, value: value.to_owned(), reason: reason.to_owned() }
}
