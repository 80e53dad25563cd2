//! Configuration loading and typed config structures for the Tempo Relay.
//!
//! The optional configuration file is `tempo-relay.yaml` in the working
//! directory. Every field has a default, so an empty or missing file
//! yields a working relay on port 3333 polling the clock every 50 ms.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::adapter::DEFAULT_BPM;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
///
/// Mirrors the structure of `tempo-relay.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelayConfig {
    /// Listening socket for the observer channel and status API.
    #[serde(default)]
    pub server: ServerSection,

    /// Clock polling and local clock parameters.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Defaults used by observer clients.
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `PORT` overrides `server.port`
    /// - `TEMPO_POLL_INTERVAL_MS` overrides `clock.poll_interval_ms`
    /// - `TEMPO_SERVER_URL` overrides `client.server_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is not a valid
    /// number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PORT") {
            self.server.port = val.trim().parse().map_err(|e| ConfigError::Invalid {
                reason: format!("PORT={val:?} is not a valid port: {e}"),
            })?;
        }
        if let Some(val) = lookup("TEMPO_POLL_INTERVAL_MS") {
            self.clock.poll_interval_ms = val.trim().parse().map_err(|e| ConfigError::Invalid {
                reason: format!("TEMPO_POLL_INTERVAL_MS={val:?} is not a number: {e}"),
            })?;
        }
        if let Some(val) = lookup("TEMPO_SERVER_URL") {
            self.client.server_url = val;
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "clock.poll_interval_ms must be at least 1".to_owned(),
            });
        }
        if !(self.clock.initial_bpm.is_finite() && self.clock.initial_bpm > 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("clock.initial_bpm must be positive, got {}", self.clock.initial_bpm),
            });
        }
        if !(self.clock.quantum.is_finite() && self.clock.quantum > 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("clock.quantum must be positive, got {}", self.clock.quantum),
            });
        }
        Ok(())
    }
}

/// Listening socket configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// The host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Clock polling configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClockConfig {
    /// Milliseconds between clock samples while observers are connected.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Tempo the local clock starts at.
    #[serde(default = "default_initial_bpm")]
    pub initial_bpm: f64,

    /// Beats per bar; phase wraps at this value.
    #[serde(default = "default_quantum")]
    pub quantum: f64,
}

impl ClockConfig {
    /// Poll interval as a [`Duration`].
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            initial_bpm: default_initial_bpm(),
            quantum: default_quantum(),
        }
    }
}

/// Observer client defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Address observers connect to.
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG`
    /// is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3333
}

const fn default_poll_interval_ms() -> u64 {
    50
}

const fn default_initial_bpm() -> f64 {
    DEFAULT_BPM
}

const fn default_quantum() -> f64 {
    4.0
}

fn default_server_url() -> String {
    "http://localhost:3333".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
