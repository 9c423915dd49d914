//! Logging setup
//!
//! Library code only emits `tracing` events; binaries call [`init_logging`]
//! or [`init_logging_with_config`] once to install a subscriber. `RUST_LOG`
//! takes precedence over the configured level when it is set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

use crate::config::LoggingConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            level: config.level.parse()?,
            with_timestamp: config.with_timestamp,
            with_target: config.with_target,
            json_format: config.json_format,
        })
    }
}

/// Install the global subscriber with default settings
///
/// # Example
/// ```
/// use boundwit_core::logging::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
///
/// # Example
/// ```
/// use boundwit_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug).with_target(false);
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let registry = tracing_subscriber::registry().with(env_filter);
    let target = config.with_target;

    let result = match (config.json_format, config.with_timestamp) {
        (true, true) => registry.with(fmt::layer().json().with_target(target)).try_init(),
        (true, false) => registry
            .with(fmt::layer().json().without_time().with_target(target))
            .try_init(),
        (false, true) => registry.with(fmt::layer().with_target(target)).try_init(),
        (false, false) => registry
            .with(fmt::layer().without_time().with_target(target))
            .try_init(),
    };

    result.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.with_timestamp);
        assert!(config.with_target);
        assert!(!config.json_format);
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new(LogLevel::Debug)
            .with_timestamp(false)
            .with_target(false)
            .json_format(true);

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_timestamp);
        assert!(!config.with_target);
        assert!(config.json_format);
    }

    #[test]
    fn test_log_config_from_section() {
        let mut section = LoggingConfig::default();
        section.level = "warn".to_string();
        section.json_format = true;

        let config = LogConfig::try_from(&section).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(config.json_format);

        section.level = "chatty".to_string();
        assert!(matches!(
            LogConfig::try_from(&section),
            Err(LoggingError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        // whichever call comes first may succeed; a repeat never does
        let _ = init_logging_with_config(LogConfig::new(LogLevel::Error));
        assert!(init_logging_with_config(LogConfig::new(LogLevel::Error)).is_err());
    }
}
