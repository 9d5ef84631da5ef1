//! Configuration loading and typed config structures for the monitor.
//!
//! Configuration lives in an optional `tempwatch.yaml` next to the
//! binary's working directory. Every field has a default, so an absent
//! file or a partial one is fine. Environment variables are applied on
//! top of the YAML values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::watcher::WatcherConfig;

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

    /// An environment override could not be parsed.
    #[error("invalid {name}: {message}")]
    InvalidEnv {
        /// The variable name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A setting parsed but is outside its allowed range.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// The offending setting.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    /// HTTP listener and cross-origin settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Watched file and watcher timing.
    #[serde(default)]
    pub watch: WatchSection,

    /// Real-time channel behaviour.
    #[serde(default)]
    pub realtime: RealtimeSection,
}

impl MonitorConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// Recognised variables: `HOST`, `PORT`, `CORS_ORIGIN`,
    /// `TEMPERATURE_FILE`, `STABILITY_THRESHOLD_MS`, `POLL_INTERVAL_MS`,
    /// `SNAPSHOT_ON_CONNECT`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that parse but cannot be used.
    ///
    /// A zero poll interval has no meaningful tick period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                message: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }

    /// Apply overrides looked up through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(file) = lookup("TEMPERATURE_FILE") {
            self.watch.file = PathBuf::from(file);
        }
        if let Some(ms) = lookup("STABILITY_THRESHOLD_MS") {
            self.watch.stability_threshold_ms = parse_env("STABILITY_THRESHOLD_MS", &ms)?;
        }
        if let Some(ms) = lookup("POLL_INTERVAL_MS") {
            self.watch.poll_interval_ms = parse_env("POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(flag) = lookup("SNAPSHOT_ON_CONNECT") {
            self.realtime.snapshot_on_connect = parse_env("SNAPSHOT_ON_CONNECT", &flag)?;
        }
        self.validate()
    }
}

fn parse_env<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name,
        message: format!("{e} (got {raw:?})"),
    })
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The single origin allowed by the cross-origin policy.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3001
}

fn default_cors_origin() -> String {
    String::from("http://localhost:5173")
}

/// Watched file settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchSection {
    /// Path of the temperature file.
    #[serde(default = "default_file")]
    pub file: PathBuf,

    /// Quiet period before a change settles, in milliseconds.
    #[serde(default = "default_stability_threshold_ms")]
    pub stability_threshold_ms: u64,

    /// Probe interval while watching, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl WatchSection {
    /// Watcher timing derived from this section.
    pub const fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            stability_threshold: Duration::from_millis(self.stability_threshold_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            file: default_file(),
            stability_threshold_ms: default_stability_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_file() -> PathBuf {
    PathBuf::from("temperature.txt")
}

const fn default_stability_threshold_ms() -> u64 {
    100
}

const fn default_poll_interval_ms() -> u64 {
    50
}

/// Real-time channel settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RealtimeSection {
    /// Push the current readings to a session as soon as it connects.
    ///
    /// Off by default: new sessions wait for the next file change.
    #[serde(default)]
    pub snapshot_on_connect: bool,
}
