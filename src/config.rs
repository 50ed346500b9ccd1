//! Driver configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

fn default_baud_rate() -> u32 {
    57_600
}

fn default_reconnect_interval_ms() -> u64 {
    1000
}

/// Configuration for a [`Driver`](crate::Driver).
///
/// Only the device path is required; baud rate and reconnect cadence
/// default to the values the device ships with.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub device: String,

    /// Baud rate of the serial link.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Delay between reconnection attempts, in milliseconds.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

impl DriverConfig {
    /// Configuration for a device path with default baud rate and
    /// reconnect interval.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reconnect interval as a [`Duration`].
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = DriverConfig::new("/dev/ttyUSB0");
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.reconnect_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_json_minimal() {
        let config = DriverConfig::from_json(r#"{"device": "/dev/ttyACM1"}"#).unwrap();
        assert_eq!(config.device, "/dev/ttyACM1");
        assert_eq!(config.baud_rate, 57_600);
    }

    #[test]
    fn test_from_json_overrides() {
        let config = DriverConfig::from_json(
            r#"{"device": "/dev/ttyUSB1", "baud_rate": 115200, "reconnect_interval_ms": 250}"#,
        )
        .unwrap();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.reconnect_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_json_requires_device() {
        assert!(DriverConfig::from_json("{}").is_err());
    }
}
