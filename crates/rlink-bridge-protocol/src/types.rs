//! Common types used in the bridge protocol.

use crate::constants::*;

// ============================================================================
// Radio Registers
// ============================================================================

/// CC111x radio registers the host may program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Sync1 = 0x00,
    Sync0 = 0x01,
    PktLen = 0x02,
    PktCtrl1 = 0x03,
    PktCtrl0 = 0x04,
    FsCtrl1 = 0x07,
    Freq2 = 0x09,
    Freq1 = 0x0a,
    Freq0 = 0x0b,
    MdmCfg4 = 0x0c,
    MdmCfg3 = 0x0d,
    MdmCfg2 = 0x0e,
    MdmCfg1 = 0x0f,
    MdmCfg0 = 0x10,
    Deviatn = 0x11,
    Mcsm0 = 0x14,
    FocCfg = 0x15,
    AgcCtrl2 = 0x17,
    AgcCtrl1 = 0x18,
    AgcCtrl0 = 0x19,
    Frend1 = 0x1a,
    Frend0 = 0x1b,
    FsCal3 = 0x1c,
    FsCal2 = 0x1d,
    FsCal1 = 0x1e,
    FsCal0 = 0x1f,
    Test1 = 0x24,
    Test0 = 0x25,
    PaTable0 = 0x2e,
}

impl Register {
    /// Register address byte.
    pub fn address(self) -> u8 {
        self as u8
    }
}

/// One register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSetting {
    /// Register to write.
    pub register: Register,
    /// Value to write.
    pub value: u8,
}

impl RegisterSetting {
    pub fn new(register: Register, value: u8) -> Self {
        RegisterSetting { register, value }
    }
}

/// Radio mode a set of mode registers applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegisterMode {
    Tx = 0x01,
    Rx = 0x02,
}

/// Receive filter bandwidth, written to the top bits of MDMCFG4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RxFilterMode {
    /// 300 kHz.
    Wide = 0x50,
    /// 150 kHz.
    Narrow = 0x90,
}

impl RxFilterMode {
    /// MDMCFG4 value for this filter at the pump's 16 kbps symbol rate.
    pub fn mdmcfg4(self) -> RegisterSetting {
        const DRATE_E: u8 = 0x09;
        RegisterSetting::new(Register::MdmCfg4, self as u8 | DRATE_E)
    }
}

/// Register writes that tune the radio to `mhz`, FREQ0 first.
pub fn frequency_registers(mhz: f64) -> [RegisterSetting; 3] {
    let value = (mhz * 1_000_000.0 / (XTAL_FREQ_HZ / 65_536.0)) as u32;
    [
        RegisterSetting::new(Register::Freq0, (value & 0xff) as u8),
        RegisterSetting::new(Register::Freq1, ((value >> 8) & 0xff) as u8),
        RegisterSetting::new(Register::Freq2, ((value >> 16) & 0xff) as u8),
    ]
}

// ============================================================================
// LEDs
// ============================================================================

/// Bridge LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Led {
    Green = 0,
    Blue = 1,
}

/// LED drive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LedMode {
    Off = 0,
    On = 1,
    Auto = 2,
}

// ============================================================================
// Firmware Version
// ============================================================================

/// Compatibility of the bridge's radio firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FirmwareState {
    /// Version not read yet.
    #[default]
    Unknown,
    /// At or above the known-good version.
    UpToDate,
    /// Older than the known-good version; usable with a warning.
    OutOfDate,
    /// Not a radio firmware version string; pump operations are blocked.
    Invalid,
}

impl std::fmt::Display for FirmwareState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirmwareState::Unknown => write!(f, "unknown"),
            FirmwareState::UpToDate => write!(f, "up to date"),
            FirmwareState::OutOfDate => write!(f, "out of date"),
            FirmwareState::Invalid => write!(f, "invalid"),
        }
    }
}

/// A parsed `subg_rfspy X.Y` version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
    components: Vec<u32>,
    version_string: String,
}

impl FirmwareVersion {
    /// Parse a version string. Returns `None` without the firmware prefix or
    /// without at least one numeric component.
    pub fn parse(version_string: &str) -> Option<Self> {
        let trimmed = version_string.trim_end_matches('\0').trim();
        let rest = trimmed.strip_prefix(FIRMWARE_PREFIX)?;
        let components = rest
            .split('.')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        if components.is_empty() {
            return None;
        }
        Some(FirmwareVersion {
            components,
            version_string: trimmed.to_string(),
        })
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    pub fn major(&self) -> u32 {
        self.components[0]
    }

    pub fn minor(&self) -> u32 {
        self.components.get(1).copied().unwrap_or(0)
    }

    /// Firmware before 2.0 omits the success code from responses.
    pub fn is_legacy(&self) -> bool {
        self.major() < 2
    }

    pub fn supports_read_register(&self) -> bool {
        self.major() >= 2
    }

    /// Compare against [`KNOWN_GOOD_FIRMWARE`].
    pub fn state(&self) -> FirmwareState {
        if (self.major(), self.minor()) >= KNOWN_GOOD_FIRMWARE {
            FirmwareState::UpToDate
        } else {
            FirmwareState::OutOfDate
        }
    }

    /// Classify a raw version string.
    pub fn classify(version_string: &str) -> FirmwareState {
        match FirmwareVersion::parse(version_string) {
            Some(version) => version.state(),
            None => {
                log::warn!("Unrecognized radio firmware version {:?}", version_string);
                FirmwareState::Invalid
            }
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.version_string)
    }
}
