//! Driver configuration.
//!
//! All fields have defaults matching the module's factory behavior, so a
//! YAML file only needs to name what it changes:
//!
//! ```yaml
//! command_timeout_ms: 300
//! queue_capacity: 16
//! ```

use std::path::Path;
use std::time::Duration;

use rylr998_protocol::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Timing and buffering settings for a [`RadioDriver`](crate::RadioDriver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Reply timeout for configuration commands.
    pub command_timeout_ms: u64,
    /// Timeout used while polling for inbound packets.
    pub receive_timeout_ms: u64,
    /// Number of `AT` probes sent by the liveness check.
    pub liveness_attempts: u32,
    /// Maximum number of buffered packets; the oldest is dropped when full.
    /// Zero means unbounded.
    pub queue_capacity: usize,
    /// How long the reset line is held low by a hardware reset.
    pub reset_pulse_ms: u64,
    /// Settling time after releasing the reset line at construction.
    pub reset_settle_ms: u64,
    /// UART baud rate used when opening a serial transport.
    pub baud_rate: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            command_timeout_ms: 500,
            receive_timeout_ms: 800,
            liveness_attempts: 5,
            queue_capacity: 64,
            reset_pulse_ms: 100,
            reset_settle_ms: 200,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl DriverConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn reset_pulse(&self) -> Duration {
        Duration::from_millis(self.reset_pulse_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.command_timeout(), Duration::from_millis(500));
        assert_eq!(config.receive_timeout(), Duration::from_millis(800));
        assert_eq!(config.liveness_attempts, 5);
        assert_eq!(config.baud_rate, 115200);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DriverConfig::from_yaml_str("command_timeout_ms: 50\nqueue_capacity: 4\n").unwrap();
        assert_eq!(config.command_timeout_ms, 50);
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.receive_timeout_ms, 800);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = DriverConfig::from_yaml_str("command_timeout_ms: soon").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DriverConfig::load("/nonexistent/rylr998.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
