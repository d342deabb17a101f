//! Commands that can be sent to the bridge firmware.

use std::time::Duration;

use crate::constants::*;
use crate::types::*;

/// Commands understood by `subg_rfspy` firmware.
///
/// Multi-byte integers are big-endian on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// Ask whether the radio is ready.
    GetState,

    /// Read the radio firmware version string.
    GetVersion,

    /// Listen for one packet.
    GetPacket {
        /// Channel to listen on.
        channel: u8,
        /// Listen timeout in milliseconds; 0 listens until interrupted.
        timeout_ms: u32,
    },

    /// Transmit without listening.
    SendPacket {
        /// Channel to send on.
        channel: u8,
        /// Extra copies to send; 0 sends the packet once.
        repeat_count: u8,
        /// Gap between copies in milliseconds.
        delay_ms: u8,
        /// Encoded radio frame.
        data: Vec<u8>,
    },

    /// Transmit, then listen for one reply.
    SendAndListen {
        /// Channel to send on.
        send_channel: u8,
        /// Extra copies to send; 0 sends the packet once.
        repeat_count: u8,
        /// Gap between copies in milliseconds.
        delay_ms: u8,
        /// Channel to listen on.
        listen_channel: u8,
        /// Listen window in milliseconds.
        timeout_ms: u32,
        /// Times the firmware repeats the whole send/listen on silence.
        retry_count: u8,
        /// Encoded radio frame.
        data: Vec<u8>,
    },

    /// Write a radio register.
    UpdateRegister {
        /// Register address.
        register: Register,
        /// New value.
        value: u8,
    },

    /// Reset the radio.
    Reset,

    /// Drive an LED.
    Led {
        /// Which LED.
        led: Led,
        /// Drive mode.
        mode: LedMode,
    },

    /// Read a radio register.
    ReadRegister {
        /// Register address.
        register: Register,
    },

    /// Registers applied whenever the radio enters `mode`.
    SetModeRegisters {
        /// TX or RX.
        mode: RegisterMode,
        /// Register writes.
        settings: Vec<RegisterSetting>,
    },
}

impl BridgeCommand {
    /// Command code byte.
    pub fn code(&self) -> u8 {
        match self {
            BridgeCommand::GetState => CMD_GET_STATE,
            BridgeCommand::GetVersion => CMD_GET_VERSION,
            BridgeCommand::GetPacket { .. } => CMD_GET_PACKET,
            BridgeCommand::SendPacket { .. } => CMD_SEND_PACKET,
            BridgeCommand::SendAndListen { .. } => CMD_SEND_AND_LISTEN,
            BridgeCommand::UpdateRegister { .. } => CMD_UPDATE_REGISTER,
            BridgeCommand::Reset => CMD_RESET,
            BridgeCommand::Led { .. } => CMD_LED,
            BridgeCommand::ReadRegister { .. } => CMD_READ_REGISTER,
            BridgeCommand::SetModeRegisters { .. } => CMD_SET_MODE_REGISTERS,
        }
    }

    /// Name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeCommand::GetState => "GetState",
            BridgeCommand::GetVersion => "GetVersion",
            BridgeCommand::GetPacket { .. } => "GetPacket",
            BridgeCommand::SendPacket { .. } => "SendPacket",
            BridgeCommand::SendAndListen { .. } => "SendAndListen",
            BridgeCommand::UpdateRegister { .. } => "UpdateRegister",
            BridgeCommand::Reset => "Reset",
            BridgeCommand::Led { .. } => "Led",
            BridgeCommand::ReadRegister { .. } => "ReadRegister",
            BridgeCommand::SetModeRegisters { .. } => "SetModeRegisters",
        }
    }

    /// Encode the command bytes, without the BLE length prefix.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![self.code()];

        match self {
            BridgeCommand::GetState | BridgeCommand::GetVersion | BridgeCommand::Reset => {}

            BridgeCommand::GetPacket {
                channel,
                timeout_ms,
            } => {
                buf.push(*channel);
                buf.extend_from_slice(&timeout_ms.to_be_bytes());
            }

            BridgeCommand::SendPacket {
                channel,
                repeat_count,
                delay_ms,
                data,
            } => {
                buf.extend_from_slice(&[*channel, *repeat_count, *delay_ms]);
                buf.extend_from_slice(data);
            }

            BridgeCommand::SendAndListen {
                send_channel,
                repeat_count,
                delay_ms,
                listen_channel,
                timeout_ms,
                retry_count,
                data,
            } => {
                buf.extend_from_slice(&[*send_channel, *repeat_count, *delay_ms, *listen_channel]);
                buf.extend_from_slice(&timeout_ms.to_be_bytes());
                buf.push(*retry_count);
                buf.extend_from_slice(data);
            }

            BridgeCommand::UpdateRegister { register, value } => {
                // Older firmware reads a fixed four-byte command.
                buf.extend_from_slice(&[register.address(), *value, 0]);
            }

            BridgeCommand::Led { led, mode } => {
                buf.extend_from_slice(&[*led as u8, *mode as u8]);
            }

            BridgeCommand::ReadRegister { register } => {
                buf.push(register.address());
            }

            BridgeCommand::SetModeRegisters { mode, settings } => {
                buf.push(*mode as u8);
                for setting in settings {
                    buf.extend_from_slice(&[setting.register.address(), setting.value]);
                }
            }
        }

        buf
    }

    /// Whether the bridge writes a reply to this command.
    pub fn expects_response(&self) -> bool {
        !matches!(self, BridgeCommand::Reset)
    }

    /// Whether the reply carries a received radio packet.
    pub fn is_listen(&self) -> bool {
        matches!(
            self,
            BridgeCommand::GetPacket { .. } | BridgeCommand::SendAndListen { .. }
        )
    }

    /// How long to wait for the bridge's reply, given the BLE round-trip
    /// allowance. A GetPacket that listens until interrupted waits for
    /// [`Duration::MAX`].
    pub fn response_timeout(&self, ble_latency: Duration) -> Duration {
        match self {
            BridgeCommand::GetPacket { timeout_ms: 0, .. } => Duration::MAX,
            BridgeCommand::GetPacket { timeout_ms, .. } => {
                Duration::from_millis(*timeout_ms as u64) + ble_latency
            }
            BridgeCommand::SendAndListen {
                repeat_count,
                delay_ms,
                timeout_ms,
                retry_count,
                data,
                ..
            } => {
                let send = send_time_ms(data.len(), *repeat_count, *delay_ms);
                let per_try = send + *timeout_ms as f64;
                let total = (*retry_count as f64 + 1.0) * per_try;
                Duration::from_millis(total.ceil() as u64) + ble_latency
            }
            _ => ble_latency,
        }
    }
}

/// Air time for `repeat_count` extra copies of a `frame_len`-byte frame,
/// in milliseconds. The frame is already 4b6b encoded by the caller, so one
/// byte is eight bits on air.
pub fn send_time_ms(frame_len: usize, repeat_count: u8, delay_ms: u8) -> f64 {
    let single = frame_len as f64 * 8.0 / RADIO_BITRATE * 1000.0;
    let gap = (delay_ms as u32).max(MIN_PACKET_GAP_MS) as f64;
    (repeat_count as f64 + 1.0) * (single + gap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_get_packet() {
        let cmd = BridgeCommand::GetPacket {
            channel: 2,
            timeout_ms: 0x01020304,
        };
        assert_eq!(cmd.encode(), vec![3, 2, 1, 2, 3, 4]);
        assert!(cmd.is_listen());
    }

    #[test]
    fn test_encode_send_and_listen() {
        let cmd = BridgeCommand::SendAndListen {
            send_channel: 0,
            repeat_count: 255,
            delay_ms: 0,
            listen_channel: 0,
            timeout_ms: 12000,
            retry_count: 0,
            data: vec![0xa9, 0x65],
        };
        assert_eq!(
            cmd.encode(),
            vec![5, 0, 255, 0, 0, 0x00, 0x00, 0x2e, 0xe0, 0, 0xa9, 0x65]
        );
    }

    #[test]
    fn test_encode_registers() {
        let cmd = BridgeCommand::UpdateRegister {
            register: Register::Freq0,
            value: 0x88,
        };
        assert_eq!(cmd.encode(), vec![6, 0x0b, 0x88, 0]);

        let cmd = BridgeCommand::SetModeRegisters {
            mode: RegisterMode::Rx,
            settings: vec![
                RegisterSetting::new(Register::Freq0, 1),
                RegisterSetting::new(Register::Freq1, 2),
            ],
        };
        assert_eq!(cmd.encode(), vec![10, 2, 0x0b, 1, 0x0a, 2]);

        let cmd = BridgeCommand::Led {
            led: Led::Blue,
            mode: LedMode::Auto,
        };
        assert_eq!(cmd.encode(), vec![8, 1, 2]);
    }

    #[test]
    fn test_response_timeout() {
        let latency = Duration::from_millis(1500);

        let get = BridgeCommand::GetPacket {
            channel: 0,
            timeout_ms: 500,
        };
        assert_eq!(get.response_timeout(latency), Duration::from_millis(2000));
        assert_eq!(BridgeCommand::GetVersion.response_timeout(latency), latency);

        let unbounded = BridgeCommand::GetPacket {
            channel: 0,
            timeout_ms: 0,
        };
        assert_eq!(unbounded.response_timeout(latency), Duration::MAX);

        // One 16-byte frame: 7.8125 ms on air plus the 12 ms minimum gap.
        let listen = BridgeCommand::SendAndListen {
            send_channel: 0,
            repeat_count: 0,
            delay_ms: 0,
            listen_channel: 0,
            timeout_ms: 180,
            retry_count: 1,
            data: vec![0; 16],
        };
        // 2 * (19.8125 + 180) = 399.625 -> 400
        assert_eq!(listen.response_timeout(latency), Duration::from_millis(1900));
    }
}
