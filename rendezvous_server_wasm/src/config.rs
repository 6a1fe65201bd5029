//! Relay configuration
//!
//! Read from environment variables. The listening address is chosen by the
//! WASI host (`wasmtime serve --addr`), so only relay behaviour is configured
//! here.

use crate::error::ConfigError;
use std::{path::PathBuf, time::Duration};

pub const IDLE_TIMEOUT_VAR: &str = "RENDEZVOUS_IDLE_TIMEOUT_SECS";
pub const MAX_QUEUED_EVENTS_VAR: &str = "RENDEZVOUS_MAX_QUEUED_EVENTS";
pub const LOG_FILTER_VAR: &str = "RUST_LOG";
pub const STATE_FILE_VAR: &str = "RENDEZVOUS_STATE_FILE";

const DEFAULT_STATE_FILE: &str = "rendezvous_state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// A connection that neither polls nor emits for this long is disconnected
    pub idle_timeout: Duration,
    /// Outbound events buffered per connection before the oldest is dropped
    pub max_queued_events: usize,
    /// `tracing_subscriber::EnvFilter` directives
    pub log_filter: String,
    /// Where the relay tables are kept between requests; `None` keeps them
    /// in memory only, which needs a host that reuses the instance
    pub state_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            max_queued_events: 256,
            log_filter: "info".to_string(),
            state_file: Some(PathBuf::from(DEFAULT_STATE_FILE)),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `lookup`, falling back to defaults for unset keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let idle_timeout = match lookup(IDLE_TIMEOUT_VAR) {
            Some(value) => Duration::from_secs(parse_positive(IDLE_TIMEOUT_VAR, value)?),
            None => defaults.idle_timeout,
        };
        let max_queued_events = match lookup(MAX_QUEUED_EVENTS_VAR) {
            Some(value) => {
                let parsed = parse_positive(MAX_QUEUED_EVENTS_VAR, value.clone())?;
                usize::try_from(parsed).map_err(|_| ConfigError::InvalidNumber {
                    key: MAX_QUEUED_EVENTS_VAR,
                    value,
                })?
            }
            None => defaults.max_queued_events,
        };
        let log_filter = lookup(LOG_FILTER_VAR)
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or(defaults.log_filter);
        let state_file = match lookup(STATE_FILE_VAR) {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => defaults.state_file,
        };

        Ok(Self {
            idle_timeout,
            max_queued_events,
            log_filter,
            state_file,
        })
    }
}

fn parse_positive(key: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_vars_use_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn vars_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            (IDLE_TIMEOUT_VAR, "90"),
            (MAX_QUEUED_EVENTS_VAR, " 16 "),
            (LOG_FILTER_VAR, "rendezvous_signaling=debug"),
            (STATE_FILE_VAR, "/tmp/relay.json"),
        ]))
        .unwrap();

        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.max_queued_events, 16);
        assert_eq!(config.log_filter, "rendezvous_signaling=debug");
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/relay.json")));
    }

    #[test]
    fn empty_state_file_keeps_state_in_memory() {
        let config = ServerConfig::from_lookup(lookup(&[(STATE_FILE_VAR, "")])).unwrap();
        assert_eq!(config.state_file, None);
    }

    #[test]
    fn zero_or_garbage_is_rejected() {
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[(MAX_QUEUED_EVENTS_VAR, "0")])),
            Err(ConfigError::InvalidNumber {
                key: MAX_QUEUED_EVENTS_VAR,
                value: "0".to_string()
            })
        );
        assert!(ServerConfig::from_lookup(lookup(&[(IDLE_TIMEOUT_VAR, "soon")])).is_err());
    }

    #[test]
    fn queue_size_beyond_usize_is_rejected() {
        let too_big = (u128::from(u64::MAX) + 1).to_string();
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[(MAX_QUEUED_EVENTS_VAR, too_big.as_str())])),
            Err(ConfigError::InvalidNumber {
                key: MAX_QUEUED_EVENTS_VAR,
                value: too_big.clone()
            })
        );

        // Fits in u64 but not in a 32-bit usize
        if usize::BITS < 64 {
            let wide = u64::MAX.to_string();
            assert!(
                ServerConfig::from_lookup(lookup(&[(MAX_QUEUED_EVENTS_VAR, wide.as_str())]))
                    .is_err()
            );
        }
    }
}
