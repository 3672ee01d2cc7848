//! Client configuration.
//!
//! Loaded from an optional YAML file; every field has a default.
//! `CHECKMATE_URL` overrides the feed URL.

use std::path::Path;

use serde::Deserialize;

use crate::error::ClientError;

/// Top-level configuration for a subscriber process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `WebSocket` URL of the observer stream.
    pub url: String,
    /// Reconnection backoff settings.
    pub reconnection: ReconnectionConfig,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::from("ws://127.0.0.1:8080/ws/races"),
            reconnection: ReconnectionConfig::default(),
            log_level: String::from("info"),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. An empty document yields
    /// the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not match the expected shape.
    pub fn parse(yaml: &str) -> Result<Self, ClientError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `CHECKMATE_URL` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CHECKMATE_URL") {
            self.url = url;
        }
    }

    /// Reject settings the feed cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ClientError::InvalidConfig {
                field: "url",
                reason: format!("expected a ws:// or wss:// URL, got {:?}", self.url),
            });
        }
        self.reconnection.validate()
    }
}

/// Exponential backoff between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectionConfig {
    /// Delay before the first reconnection attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the delay (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Factor applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

const fn default_initial_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_backoff_multiplier() -> u32 {
    2
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl ReconnectionConfig {
    fn validate(&self) -> Result<(), ClientError> {
        if self.initial_delay_ms == 0 {
            return Err(ClientError::InvalidConfig {
                field: "reconnection.initial_delay_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ClientError::InvalidConfig {
                field: "reconnection.max_delay_ms",
                reason: format!(
                    "{} is below initial_delay_ms {}",
                    self.max_delay_ms, self.initial_delay_ms
                ),
            });
        }
        if self.backoff_multiplier == 0 {
            return Err(ClientError::InvalidConfig {
                field: "reconnection.backoff_multiplier",
                reason: String::from("must be at least 1"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_reconnection_section_keeps_other_defaults() {
        let config = ClientConfig::parse(
            "url: wss://live.example.com/ws/races\nreconnection:\n  max_delay_ms: 2000\n",
        )
        .unwrap();
        assert_eq!(config.url, "wss://live.example.com/ws/races");
        assert_eq!(config.reconnection.max_delay_ms, 2000);
        assert_eq!(config.reconnection.initial_delay_ms, 500);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn rejects_http_url() {
        let config = ClientConfig {
            url: String::from("http://localhost:8080"),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfig { field: "url", .. })
        ));
    }

    #[test]
    fn rejects_inverted_delays() {
        let config = ClientConfig {
            reconnection: ReconnectionConfig {
                initial_delay_ms: 1000,
                max_delay_ms: 10,
                backoff_multiplier: 2,
            },
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfig {
                field: "reconnection.max_delay_ms",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_multiplier() {
        let config = ClientConfig {
            reconnection: ReconnectionConfig {
                backoff_multiplier: 0,
                ..ReconnectionConfig::default()
            },
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            ClientConfig::parse("reconnection: [1, 2"),
            Err(ClientError::Yaml { .. })
        ));
    }
}
