//! Configuration management
//!
//! Defaults, a TOML file, or `BOUNDWIT_<SECTION>_<KEY>` environment
//! variables. Durations are written the humantime way (`250ms`, `30s`).
//!
//! ```toml
//! [bridge]
//! flush_interval = "5s"
//! purge_on_ack = 50
//!
//! [network]
//! bind_address = "127.0.0.1:7878"
//! connect_timeout = "5s"
//! response_timeout = "30s"
//! max_frame_size = 1048576
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::core_bridge::REMOVE_WEIGHT;
use crate::logging::LogLevel;

const ENV_PREFIX: &str = "BOUNDWIT";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub bridge: BridgeConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    pub json_format: bool,
    pub with_timestamp: bool,
    pub with_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Serve a Prometheus scrape endpoint here; unset means render on exit only
    pub listen_address: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pause between relay batches
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// After an acknowledged batch, also purge entries at or above this weight
    pub purge_on_ack: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: SocketAddr,

    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Largest frame accepted or sent, in bytes
    pub max_frame_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            purge_on_ack: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 7878)),
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(30),
            max_frame_size: 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults overridden by environment variables
    ///
    /// Variables follow the pattern `BOUNDWIT_<SECTION>_<KEY>`, for example
    /// `BOUNDWIT_NETWORK_BIND_ADDRESS=0.0.0.0:7878`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |section: &str, key: &str| lookup(&format!("{ENV_PREFIX}_{section}_{key}"));

        if let Some(level) = var("LOG", "LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = var("LOG", "JSON") {
            config.logging.json_format = parse_value("LOG_JSON", &json)?;
        }

        if let Some(enabled) = var("METRICS", "ENABLED") {
            config.metrics.enabled = parse_value("METRICS_ENABLED", &enabled)?;
        }
        if let Some(addr) = var("METRICS", "LISTEN_ADDRESS") {
            config.metrics.listen_address = Some(parse_value("METRICS_LISTEN_ADDRESS", &addr)?);
        }

        if let Some(interval) = var("BRIDGE", "FLUSH_INTERVAL") {
            config.bridge.flush_interval = parse_duration("BRIDGE_FLUSH_INTERVAL", &interval)?;
        }
        if let Some(mask) = var("BRIDGE", "PURGE_ON_ACK") {
            config.bridge.purge_on_ack = Some(parse_value("BRIDGE_PURGE_ON_ACK", &mask)?);
        }

        if let Some(addr) = var("NETWORK", "BIND_ADDRESS") {
            config.network.bind_address = parse_value("NETWORK_BIND_ADDRESS", &addr)?;
        }
        if let Some(timeout) = var("NETWORK", "CONNECT_TIMEOUT") {
            config.network.connect_timeout = parse_duration("NETWORK_CONNECT_TIMEOUT", &timeout)?;
        }
        if let Some(timeout) = var("NETWORK", "RESPONSE_TIMEOUT") {
            config.network.response_timeout = parse_duration("NETWORK_RESPONSE_TIMEOUT", &timeout)?;
        }
        if let Some(size) = var("NETWORK", "MAX_FRAME_SIZE") {
            config.network.max_frame_size = parse_value("NETWORK_MAX_FRAME_SIZE", &size)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if LogLevel::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        if self.bridge.flush_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "bridge.flush_interval must be greater than 0".to_string(),
            ));
        }

        if let Some(mask) = self.bridge.purge_on_ack {
            if mask == 0 || mask > REMOVE_WEIGHT {
                return Err(ConfigError::ValidationFailed(format!(
                    "bridge.purge_on_ack must be between 1 and {}",
                    REMOVE_WEIGHT
                )));
            }
        }

        if self.network.max_frame_size == 0 || self.network.max_frame_size > u32::MAX as usize {
            return Err(ConfigError::ValidationFailed(
                "network.max_frame_size must fit a 32-bit length prefix and be greater than 0"
                    .to_string(),
            ));
        }

        if self.network.connect_timeout.is_zero() || self.network.response_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "network timeouts must be greater than 0".to_string(),
            ));
        }

        if !self.metrics.enabled && self.metrics.listen_address.is_some() {
            return Err(ConfigError::ValidationFailed(
                "metrics.listen_address is set but metrics are disabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{ENV_PREFIX}_{name}={raw}: {e}")))
}

fn parse_duration(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(raw)
        .map_err(|e| ConfigError::InvalidValue(format!("{ENV_PREFIX}_{name}={raw}: {e}")))
}
