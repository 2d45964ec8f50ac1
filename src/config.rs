//! Configuration management for the relay server

use serde::Deserialize;
use std::env;

use crate::relay::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_BYTES};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Largest WebSocket message accepted from a client
    pub max_message_bytes: usize,
    /// Chunk size advertised to clients that don't pick their own
    pub default_chunk_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
            },
            relay: RelayConfig {
                max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
                default_chunk_size: DEFAULT_CHUNK_SIZE,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            relay: RelayConfig {
                max_message_bytes: parse_var(
                    "RELAY_MAX_MESSAGE_BYTES",
                    defaults.relay.max_message_bytes,
                )?,
                default_chunk_size: parse_var(
                    "RELAY_CHUNK_SIZE",
                    defaults.relay.default_chunk_size,
                )?,
            },
        })
        .and_then(Config::validated)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.relay.default_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "RELAY_CHUNK_SIZE",
                reason: "chunk size must be positive".to_string(),
            });
        }
        if (self.relay.default_chunk_size as usize) >= self.relay.max_message_bytes {
            return Err(ConfigError::Invalid {
                key: "RELAY_MAX_MESSAGE_BYTES",
                reason: format!(
                    "message limit {} does not fit a {} byte chunk",
                    self.relay.max_message_bytes, self.relay.default_chunk_size
                ),
            });
        }
        Ok(self)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Parse { key: &'static str, value: String },

    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse { key, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default().validated().unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.relay.default_chunk_size, 64 * 1024);
        assert_eq!(config.relay.max_message_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = Config::default();
        config.relay.default_chunk_size = 0;
        assert!(matches!(
            config.validated(),
            Err(ConfigError::Invalid { key: "RELAY_CHUNK_SIZE", .. })
        ));
    }

    #[test]
    fn test_chunk_larger_than_envelope_rejected() {
        let mut config = Config::default();
        config.relay.max_message_bytes = 1024;
        assert!(config.validated().is_err());
    }
}
