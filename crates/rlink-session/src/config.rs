//! Device actor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for one bridge connection.
///
/// All fields have defaults, so an empty YAML map is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Listen window of each idle GetPacket, in milliseconds.
    pub idle_timeout_ms: u32,
    /// Channel to idle-listen on once connected, if any.
    pub idle_channel: Option<u8>,
    /// Allowance for BLE round trips on top of radio time.
    pub ble_latency_ms: u64,
}

impl SessionConfig {
    pub fn ble_latency(&self) -> Duration {
        Duration::from_millis(self.ble_latency_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            idle_timeout_ms: 60_000,
            idle_channel: None,
            ble_latency_ms: 1_500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_map() {
        let config: SessionConfig = serde_yaml::from_str("{}").expect("should parse");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.ble_latency(), Duration::from_millis(1500));
    }

    #[test]
    fn test_partial_config() {
        let config: SessionConfig =
            serde_yaml::from_str("idle_channel: 2\nble_latency_ms: 500\n").expect("should parse");
        assert_eq!(config.idle_channel, Some(2));
        assert_eq!(config.idle_timeout_ms, 60_000);
        assert_eq!(config.ble_latency_ms, 500);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_yaml::from_str::<SessionConfig>("idle_chanel: 2\n").is_err());
    }
}
