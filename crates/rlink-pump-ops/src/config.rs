//! Pump settings.
//!
//! Settings come from a YAML file owned by the application:
//!
//! ```yaml
//! pump_id: "350535"
//! pump_model: 551
//! utc_offset_secs: -28800
//! region: north_america
//! radio:
//!   retry_count: 3
//!   wait_time_ms: 180
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use minimed_history::PumpModel;
use minimed_packet::PumpAddress;
use rlink_bridge_protocol::{Register, RegisterSetting};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Radio regulatory region, which fixes the frequency band and modem setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpRegion {
    #[default]
    NorthAmerica,
    WorldWide,
}

impl PumpRegion {
    /// Scan band in hundredths of a MHz: (first, last).
    fn band(self) -> (u32, u32) {
        match self {
            PumpRegion::NorthAmerica => (91_645, 91_680),
            PumpRegion::WorldWide => (86_825, 86_865),
        }
    }

    /// Candidate frequencies in MHz, 0.05 MHz apart, lowest first.
    pub fn scan_frequencies(self) -> Vec<f64> {
        let (first, last) = self.band();
        (first..=last)
            .step_by(5)
            .map(|f| f as f64 / 100.0)
            .collect()
    }

    /// Frequency used when no scan result is available.
    pub fn middle_frequency(self) -> f64 {
        let frequencies = self.scan_frequencies();
        frequencies[frequencies.len() / 2]
    }

    pub fn contains(self, mhz: f64) -> bool {
        let (first, last) = self.band();
        let hundredths = (mhz * 100.0).round() as u32;
        (first..=last).contains(&hundredths)
    }

    /// Modem registers for the region's channel spacing and deviation.
    pub fn radio_settings(self) -> [RegisterSetting; 4] {
        let (mdmcfg4, mdmcfg1, mdmcfg0, deviatn) = match self {
            PumpRegion::WorldWide => (0x59, 0x62, 0x1a, 0x13),
            PumpRegion::NorthAmerica => (0x99, 0x61, 0x7e, 0x15),
        };
        [
            RegisterSetting::new(Register::MdmCfg4, mdmcfg4),
            RegisterSetting::new(Register::MdmCfg1, mdmcfg1),
            RegisterSetting::new(Register::MdmCfg0, mdmcfg0),
            RegisterSetting::new(Register::Deviatn, deviatn),
        ]
    }
}

/// Timing and channel defaults for send/listen cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioSettings {
    /// Extra send/listen attempts after the first.
    pub retry_count: u8,
    /// Listen window after each send.
    pub wait_time_ms: u32,
    /// Gap between repeated copies of a packet.
    pub ms_between_packets: u8,
    pub listen_channel: u8,
    pub send_channel: u8,
    /// How long a wake-up keeps the pump's radio on.
    pub wake_duration_secs: u64,
}

impl RadioSettings {
    pub fn wake_duration(&self) -> Duration {
        Duration::from_secs(self.wake_duration_secs)
    }
}

impl Default for RadioSettings {
    fn default() -> Self {
        RadioSettings {
            retry_count: 3,
            wait_time_ms: 180,
            ms_between_packets: 0,
            listen_channel: 0,
            send_channel: 0,
            wake_duration_secs: 60,
        }
    }
}

/// Everything the host needs to know about a pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PumpSettings {
    /// Pump serial, 6 hex digits.
    pub pump_id: PumpAddress,
    /// Model, when known ahead of time.
    #[serde(default)]
    pub pump_model: Option<PumpModel>,
    /// Pump clock offset from UTC.
    #[serde(default)]
    pub utc_offset_secs: Option<i32>,
    #[serde(default)]
    pub region: PumpRegion,
    /// Last known good frequency.
    #[serde(default)]
    pub frequency_mhz: Option<f64>,
    #[serde(default)]
    pub radio: RadioSettings,
}

impl PumpSettings {
    pub fn new(pump_id: PumpAddress) -> Self {
        PumpSettings {
            pump_id,
            pump_model: None,
            utc_offset_secs: None,
            region: PumpRegion::default(),
            frequency_mhz: None,
            radio: RadioSettings::default(),
        }
    }

    /// Parse and validate YAML settings.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings: PumpSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.utc_offset_secs {
            if FixedOffset::east_opt(secs).is_none() {
                return Err(ConfigError::invalid(
                    "utc_offset_secs",
                    format!("{} is not within a day of UTC", secs),
                ));
            }
        }
        if let Some(mhz) = self.frequency_mhz {
            if !self.region.contains(mhz) {
                return Err(ConfigError::invalid(
                    "frequency_mhz",
                    format!("{} MHz is outside the {:?} band", mhz, self.region),
                ));
            }
        }
        if self.radio.wait_time_ms == 0 {
            return Err(ConfigError::invalid("radio.wait_time_ms", "must be positive"));
        }
        let minutes = self.radio.wake_duration_secs.div_ceil(60);
        if !(1..=u8::MAX as u64).contains(&minutes) {
            return Err(ConfigError::invalid(
                "radio.wake_duration_secs",
                "must be between 1 second and 255 minutes",
            ));
        }
        Ok(())
    }

    /// Pump clock offset, if configured.
    pub fn time_zone(&self) -> Option<FixedOffset> {
        self.utc_offset_secs.and_then(FixedOffset::east_opt)
    }
}
