//! Error types for sensor access and configuration.

use thiserror::Error;

/// Errors reported by the sensor bus or the acquired sensor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// Nothing answered at the configured bus address.
    #[error("no sensor at bus address {address:#04x}")]
    NotFound { address: u8 },

    /// The bus transaction failed after acquisition.
    #[error("bus error: {0}")]
    Bus(String),

    /// The sensor answered with a value it cannot physically produce.
    #[error("implausible {quantity} reading: {value}")]
    Implausible { quantity: &'static str, value: f32 },
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`AgentConfig`](crate::AgentConfig).
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but holds values the agent cannot run with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
