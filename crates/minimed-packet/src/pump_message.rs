//! Outbound carelink messages.

use serde::{Deserialize, Serialize};

use crate::{MessageType, PacketType, PumpAddress};

/// Length of a long carelink body: argument count plus 64 bytes.
pub const LONG_BODY_LEN: usize = 65;

/// Buttons that can be pressed remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    Easy = 0,
    Esc = 1,
    Act = 2,
    Up = 3,
    Down = 4,
}

/// A message addressed to a pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpMessage {
    pub packet_type: PacketType,
    pub address: PumpAddress,
    pub message_type: MessageType,
    pub message_code: u8,
    pub body: Vec<u8>,
}

/// Long body: argument count, arguments, zero padding to 65 bytes.
pub fn long_body(args: &[u8]) -> Vec<u8> {
    let mut body = vec![0u8; LONG_BODY_LEN];
    body[0] = args.len() as u8;
    let n = args.len().min(LONG_BODY_LEN - 1);
    body[1..1 + n].copy_from_slice(&args[..n]);
    body
}

impl PumpMessage {
    /// A carelink message with an explicit body.
    ///
    /// Only carelink commands are sent by the host. Types that exist only
    /// in a MySentry or Paradigm table have no command code and give `None`.
    pub fn carelink(
        address: PumpAddress,
        message_type: MessageType,
        body: Vec<u8>,
    ) -> Option<Self> {
        let message_code = message_type.carelink_code()?;
        Some(Self::command(address, message_type, message_code, body))
    }

    /// A command with the single-byte short body.
    pub fn short(address: PumpAddress, message_type: MessageType) -> Option<Self> {
        Self::carelink(address, message_type, vec![0x00])
    }

    fn command(address: PumpAddress, message_type: MessageType, code: u8, body: Vec<u8>) -> Self {
        PumpMessage {
            packet_type: PacketType::Carelink,
            address,
            message_type,
            message_code: code,
            body,
        }
    }

    pub fn get_pump_model(address: PumpAddress) -> Self {
        Self::command(address, MessageType::GetPumpModel, 0x8d, vec![0x00])
    }

    pub fn get_battery(address: PumpAddress) -> Self {
        Self::command(address, MessageType::GetBattery, 0x72, vec![0x00])
    }

    pub fn pump_ack(address: PumpAddress) -> Self {
        Self::command(address, MessageType::PumpAck, 0x06, vec![0x00])
    }

    /// Short power-on, repeated back to back to wake the pump.
    pub fn wake(address: PumpAddress) -> Self {
        Self::command(address, MessageType::PowerOn, 0x5d, vec![0x00])
    }

    /// Keep the radio on for `minutes`.
    pub fn power_on(address: PumpAddress, minutes: u8) -> Self {
        Self::command(address, MessageType::PowerOn, 0x5d, long_body(&[1, minutes]))
    }

    pub fn button_press(address: PumpAddress, button: ButtonType) -> Self {
        Self::command(address, MessageType::ButtonPress, 0x5b, long_body(&[button as u8]))
    }

    pub fn get_history_page(address: PumpAddress, page: u8) -> Self {
        Self::command(address, MessageType::GetHistoryPage, 0x80, long_body(&[page]))
    }

    /// Same command with a short body, sent first to get the pump's attention.
    pub fn to_short(&self) -> Self {
        PumpMessage {
            body: vec![0x00],
            ..self.clone()
        }
    }

    /// Header and body, ready for [`encode_frame`](crate::encode_frame).
    pub fn tx_data(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5 + self.body.len());
        buf.push(self.packet_type.code());
        buf.extend_from_slice(self.address.as_bytes());
        buf.push(self.message_code);
        buf.extend_from_slice(&self.body);
        buf
    }
}
