//! Packet framing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{crc8, decode_4b6b, encode_4b6b, FrameError, FrameResult};

/// Decoded header length: packet type, 3-byte address, message type.
pub const HEADER_LEN: usize = 5;

/// Packet type carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// MySentry traffic (pump status broadcasts, alerts, device link).
    Sentry,
    /// Linked glucose meter readings.
    Meter,
    /// Carelink command/response traffic.
    Carelink,
    /// Glucose sensor transmitter.
    Sensor,
}

impl PacketType {
    /// Wire code for this packet type.
    pub const fn code(self) -> u8 {
        match self {
            PacketType::Sentry => 0xa2,
            PacketType::Meter => 0xa5,
            PacketType::Carelink => 0xa7,
            PacketType::Sensor => 0xa8,
        }
    }

    /// Look up a packet type by wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0xa2 => Some(PacketType::Sentry),
            0xa5 => Some(PacketType::Meter),
            0xa7 => Some(PacketType::Carelink),
            0xa8 => Some(PacketType::Sensor),
            _ => None,
        }
    }
}

/// Three-byte radio address (the pump serial number), shown as 6 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PumpAddress(pub [u8; 3]);

impl PumpAddress {
    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for PumpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for PumpAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid pump id {:?}: {}", s, e))?;
        let bytes: [u8; 3] = bytes
            .try_into()
            .map_err(|_| format!("pump id {:?} must be 6 hex digits", s))?;
        Ok(PumpAddress(bytes))
    }
}

impl Serialize for PumpAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PumpAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A validated RF packet.
///
/// Only [`decode_frame`] and [`Packet::parse`] build packets, so a `Packet`
/// always passed its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    address: PumpAddress,
    message_type: u8,
    payload: Vec<u8>,
}

impl Packet {
    /// Parse the header of a decoded, CRC-stripped frame.
    pub fn parse(bytes: &[u8]) -> FrameResult<Packet> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TooShort {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let packet_type =
            PacketType::from_code(bytes[0]).ok_or(FrameError::UnknownPacketType(bytes[0]))?;

        Ok(Packet {
            packet_type,
            address: PumpAddress([bytes[1], bytes[2], bytes[3]]),
            message_type: bytes[4],
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Packet type.
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Sender or recipient address.
    pub fn address(&self) -> PumpAddress {
        self.address
    }

    /// Raw message type byte.
    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    /// Bytes following the header, CRC excluded.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Header and payload, without CRC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.packet_type.code());
        buf.extend_from_slice(&self.address.0);
        buf.push(self.message_type);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Reverse 4b6b and check the trailing CRC-8, returning the protected bytes.
pub fn decode_payload(frame: &[u8]) -> FrameResult<Vec<u8>> {
    let mut decoded = decode_4b6b(frame)?;
    let Some(actual) = decoded.pop() else {
        return Err(FrameError::TooShort {
            expected: 1,
            actual: 0,
        });
    };
    let expected = crc8(&decoded);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }
    Ok(decoded)
}

/// Decode a radio frame into a packet.
pub fn decode_frame(frame: &[u8]) -> FrameResult<Packet> {
    let decoded = decode_payload(frame)?;
    Packet::parse(&decoded)
}

/// Append CRC-8 and 4b6b-encode.
pub fn encode_frame(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 1);
    buf.extend_from_slice(data);
    buf.push(crc8(data));
    encode_4b6b(&buf)
}
