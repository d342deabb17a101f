//! Protocol constants
//!
//! Command codes, response codes, and radio constants used by the
//! `subg_rfspy` bridge firmware.

// ============================================================================
// Command Codes (host → bridge)
// ============================================================================

/// Query whether the radio is ready.
pub const CMD_GET_STATE: u8 = 1;
/// Read the radio firmware version string.
pub const CMD_GET_VERSION: u8 = 2;
/// Listen for one packet on a channel.
pub const CMD_GET_PACKET: u8 = 3;
/// Transmit a packet without listening.
pub const CMD_SEND_PACKET: u8 = 4;
/// Transmit a packet, then listen for one reply.
pub const CMD_SEND_AND_LISTEN: u8 = 5;
/// Write one radio register.
pub const CMD_UPDATE_REGISTER: u8 = 6;
/// Reset the radio.
pub const CMD_RESET: u8 = 7;
/// Drive an LED.
pub const CMD_LED: u8 = 8;
/// Read one radio register.
pub const CMD_READ_REGISTER: u8 = 9;
/// Write registers applied when switching to TX or RX.
pub const CMD_SET_MODE_REGISTERS: u8 = 10;

// ============================================================================
// Response Codes (bridge → host)
// ============================================================================

/// No packet arrived before the listen timeout.
pub const RESP_CODE_RX_TIMEOUT: u8 = 0xaa;
/// A newer command interrupted this one.
pub const RESP_CODE_CMD_INTERRUPTED: u8 = 0xbb;
/// A packet arrived with no data.
pub const RESP_CODE_ZERO_DATA: u8 = 0xcc;
/// Command succeeded.
pub const RESP_CODE_SUCCESS: u8 = 0xdd;
/// Command parameters were rejected.
pub const RESP_CODE_INVALID_PARAM: u8 = 0x11;
/// Command code not recognised.
pub const RESP_CODE_UNKNOWN_COMMAND: u8 = 0x22;

/// Legacy UpdateRegister reply: register written.
pub const LEGACY_REGISTER_SUCCESS: u8 = 1;
/// Legacy UpdateRegister reply: no such register.
pub const LEGACY_REGISTER_INVALID: u8 = 2;

// ============================================================================
// Limits and Radio Constants
// ============================================================================

/// Largest command the bridge accepts in one BLE write, excluding the length byte.
pub const MAX_WRITE_LEN: usize = 220;

/// Radio crystal frequency in Hz.
pub const XTAL_FREQ_HZ: f64 = 24_000_000.0;

/// Over-the-air bit rate of the pump link.
pub const RADIO_BITRATE: f64 = 16_384.0;

/// Minimum gap between repeated packets, in milliseconds.
pub const MIN_PACKET_GAP_MS: u32 = 12;

/// Subtracted from the halved raw RSSI byte to get dBm.
pub const RSSI_OFFSET: i16 = 73;

/// Radio firmware version strings start with this.
pub const FIRMWARE_PREFIX: &str = "subg_rfspy ";

/// Oldest radio firmware known to work, as (major, minor).
pub const KNOWN_GOOD_FIRMWARE: (u32, u32) = (2, 0);
