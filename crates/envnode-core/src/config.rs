//! Agent configuration.
//!
//! The same structure is used on every platform; only where it is loaded from
//! differs (a JSON file on Linux, persisted settings on firmware).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default I2C address of a BME280 with SDO tied to ground.
pub const DEFAULT_SENSOR_ADDRESS: u8 = 0x76;

/// Settings for the sampling cycle and device identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Identifier printed at the start of every stats line.
    pub device_id: String,

    /// Period of the sampling timer.
    pub sample_interval_ms: u64,

    /// Time the sensor is left alone between acquisition and the first read.
    pub settle_delay_ms: u32,

    /// Bus address of the environmental sensor.
    pub sensor_address: u8,

    /// Raw pressure units per kilopascal.
    pub pressure_divisor: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_id: "envnode-0000".to_string(),
            sample_interval_ms: 20_000,
            settle_delay_ms: 2_000,
            sensor_address: DEFAULT_SENSOR_ADDRESS,
            pressure_divisor: 1000.0,
        }
    }
}

impl AgentConfig {
    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the sampling cycle cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sampleIntervalMs must be greater than zero".to_string(),
            ));
        }
        if u64::from(self.settle_delay_ms) >= self.sample_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "settleDelayMs ({}) must be shorter than sampleIntervalMs ({})",
                self.settle_delay_ms, self.sample_interval_ms
            )));
        }
        if !(self.pressure_divisor.is_finite() && self.pressure_divisor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pressureDivisor must be a positive number, got {}",
                self.pressure_divisor
            )));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.settle_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let config = AgentConfig::default();
        assert_eq!(config.sample_interval(), Duration::from_secs(20));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.sensor_address, 0x76);
        assert_eq!(config.pressure_divisor, 1000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AgentConfig::from_json(r#"{"deviceId": "bench-7", "sensorAddress": 119}"#)
            .unwrap();
        assert_eq!(config.device_id, "bench-7");
        assert_eq!(config.sensor_address, 0x77);
        assert_eq!(config.sample_interval_ms, 20_000);
    }

    #[test]
    fn test_settle_longer_than_interval_rejected() {
        let result = AgentConfig::from_json(r#"{"sampleIntervalMs": 1000, "settleDelayMs": 1500}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let config = AgentConfig {
            pressure_divisor: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = AgentConfig::from_json("{not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
