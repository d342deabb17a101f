//! Responses from the bridge firmware.

use crate::commands::BridgeCommand;
use crate::constants::*;
use crate::error::*;

/// Leading status byte of a bridge reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    RxTimeout,
    CmdInterrupted,
    ZeroData,
    Success,
    InvalidParam,
    UnknownCommand,
}

impl ResponseCode {
    pub fn from_byte(code: u8) -> Option<Self> {
        match code {
            RESP_CODE_RX_TIMEOUT => Some(ResponseCode::RxTimeout),
            RESP_CODE_CMD_INTERRUPTED => Some(ResponseCode::CmdInterrupted),
            RESP_CODE_ZERO_DATA => Some(ResponseCode::ZeroData),
            RESP_CODE_SUCCESS => Some(ResponseCode::Success),
            RESP_CODE_INVALID_PARAM => Some(ResponseCode::InvalidParam),
            RESP_CODE_UNKNOWN_COMMAND => Some(ResponseCode::UnknownCommand),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ResponseCode::RxTimeout => RESP_CODE_RX_TIMEOUT,
            ResponseCode::CmdInterrupted => RESP_CODE_CMD_INTERRUPTED,
            ResponseCode::ZeroData => RESP_CODE_ZERO_DATA,
            ResponseCode::Success => RESP_CODE_SUCCESS,
            ResponseCode::InvalidParam => RESP_CODE_INVALID_PARAM,
            ResponseCode::UnknownCommand => RESP_CODE_UNKNOWN_COMMAND,
        }
    }

    /// Map a failure code to its error; `command` is the code of the
    /// command that was sent.
    pub fn check(self, command: u8) -> Result<()> {
        match self {
            ResponseCode::Success => Ok(()),
            ResponseCode::RxTimeout => Err(BridgeError::RxTimeout),
            ResponseCode::CmdInterrupted => Err(BridgeError::CmdInterrupted),
            ResponseCode::ZeroData => Err(BridgeError::ZeroData),
            ResponseCode::InvalidParam => Err(BridgeError::InvalidParam),
            ResponseCode::UnknownCommand => Err(BridgeError::UnsupportedCommand(command)),
        }
    }
}

/// A radio packet received by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioPacket {
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Bridge packet counter.
    pub sequence: u8,
    /// Still-encoded radio frame.
    pub data: Vec<u8>,
}

impl RadioPacket {
    /// Parse `[rssi][sequence][data...]`. At least one data byte is required.
    pub fn from_rfspy(data: &[u8]) -> Option<Self> {
        if data.len() <= 2 {
            return None;
        }
        Some(RadioPacket {
            rssi: decode_rssi(data[0]),
            sequence: data[1],
            data: data[2..].to_vec(),
        })
    }

    /// Wire form, the inverse of [`RadioPacket::from_rfspy`] for even RSSI.
    pub fn to_rfspy(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.data.len() + 2);
        buf.push(encode_rssi(self.rssi));
        buf.push(self.sequence);
        buf.extend_from_slice(&self.data);
        buf
    }
}

/// Raw RSSI byte to dBm.
pub fn decode_rssi(raw: u8) -> i16 {
    let raw = raw as i16;
    let half = if raw >= 128 { (raw - 256) / 2 } else { raw / 2 };
    half - RSSI_OFFSET
}

/// dBm to the raw RSSI byte.
pub fn encode_rssi(dbm: i16) -> u8 {
    (((dbm + RSSI_OFFSET) * 2) & 0xff) as u8
}

/// A decoded bridge reply. The shape depends on the command that was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeResponse {
    /// Status-only reply.
    Code(ResponseCode),

    /// Reply to a listening command.
    Packet {
        /// Status code.
        code: ResponseCode,
        /// Packet, present on success.
        packet: Option<RadioPacket>,
    },

    /// Reply to GetVersion.
    Version {
        /// Status code.
        code: ResponseCode,
        /// Version string as reported.
        version: String,
    },

    /// Reply to ReadRegister.
    Register {
        /// Status code.
        code: ResponseCode,
        /// Register value.
        value: u8,
    },
}

impl BridgeResponse {
    /// Decode `data` as the reply to `command`. `legacy` firmware omits the
    /// status byte on success.
    pub fn decode(command: &BridgeCommand, data: &[u8], legacy: bool) -> Result<Self> {
        let invalid = || BridgeError::InvalidResponse(data.to_vec());

        match command {
            BridgeCommand::GetPacket { .. } | BridgeCommand::SendAndListen { .. } => {
                if legacy {
                    if let Some(packet) = RadioPacket::from_rfspy(data) {
                        return Ok(BridgeResponse::Packet {
                            code: ResponseCode::Success,
                            packet: Some(packet),
                        });
                    }
                }
                let (&first, rest) = data.split_first().ok_or_else(invalid)?;
                let code = ResponseCode::from_byte(first).ok_or_else(invalid)?;
                let packet = match code {
                    ResponseCode::Success => Some(RadioPacket::from_rfspy(rest).ok_or_else(invalid)?),
                    _ => None,
                };
                Ok(BridgeResponse::Packet { code, packet })
            }

            BridgeCommand::GetVersion => {
                let (code, rest) = split_code(data, legacy).ok_or_else(invalid)?;
                let version = std::str::from_utf8(rest).map_err(|_| invalid())?;
                Ok(BridgeResponse::Version {
                    code,
                    version: version.trim_end_matches('\0').to_string(),
                })
            }

            BridgeCommand::ReadRegister { .. } => {
                let (code, rest) = split_code(data, legacy).ok_or_else(invalid)?;
                let value = match code {
                    ResponseCode::Success => *rest.first().ok_or_else(invalid)?,
                    _ => 0,
                };
                Ok(BridgeResponse::Register { code, value })
            }

            BridgeCommand::UpdateRegister { .. } if legacy => {
                match data.first().copied() {
                    Some(LEGACY_REGISTER_SUCCESS) => Ok(BridgeResponse::Code(ResponseCode::Success)),
                    Some(LEGACY_REGISTER_INVALID) => {
                        Ok(BridgeResponse::Code(ResponseCode::InvalidParam))
                    }
                    _ => Err(invalid()),
                }
            }

            _ => {
                if legacy && data.is_empty() {
                    return Ok(BridgeResponse::Code(ResponseCode::Success));
                }
                let first = *data.first().ok_or_else(invalid)?;
                let code = ResponseCode::from_byte(first).ok_or_else(invalid)?;
                Ok(BridgeResponse::Code(code))
            }
        }
    }

    pub fn code(&self) -> ResponseCode {
        match self {
            BridgeResponse::Code(code) => *code,
            BridgeResponse::Packet { code, .. }
            | BridgeResponse::Version { code, .. }
            | BridgeResponse::Register { code, .. } => *code,
        }
    }

    /// Received packet, if any.
    pub fn packet(&self) -> Option<&RadioPacket> {
        match self {
            BridgeResponse::Packet { packet, .. } => packet.as_ref(),
            _ => None,
        }
    }

    /// Take the received packet, failing on any non-success status.
    pub fn into_packet(self, command: u8) -> Result<RadioPacket> {
        self.code().check(command)?;
        match self {
            BridgeResponse::Packet {
                packet: Some(packet),
                ..
            } => Ok(packet),
            _ => Err(BridgeError::ZeroData),
        }
    }
}

/// Split off the status byte. Legacy success replies have none, so any
/// first byte that is not a known code is taken as data.
fn split_code(data: &[u8], legacy: bool) -> Option<(ResponseCode, &[u8])> {
    match data.split_first() {
        Some((&first, rest)) => match ResponseCode::from_byte(first) {
            Some(code) if !legacy || code != ResponseCode::Success => Some((code, rest)),
            Some(_) => Some((ResponseCode::Success, rest)),
            None if legacy => Some((ResponseCode::Success, data)),
            None => None,
        },
        None if legacy => Some((ResponseCode::Success, data)),
        None => None,
    }
}
