//! In-memory bridge for tests.
//!
//! [`MockTransport`] records every command written to it and answers from a
//! script. Like the real firmware, a command written while a listen is
//! pending interrupts that listen: the bridge first replies
//! `CmdInterrupted` to the old command, then answers the new one.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rlink_bridge_protocol::{
    decode_write, FirmwareVersion, RadioPacket, ResponseCode, CMD_GET_PACKET, CMD_GET_VERSION,
    CMD_READ_REGISTER, CMD_RESET, CMD_SEND_AND_LISTEN, CMD_SEND_PACKET, CMD_UPDATE_REGISTER,
    LEGACY_REGISTER_SUCCESS, RESP_CODE_CMD_INTERRUPTED, RESP_CODE_SUCCESS,
};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::error::TransportError;
use crate::transport::{BridgeTransport, ConnectionState};

/// A command as the mock bridge received it, length prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommand {
    bytes: Vec<u8>,
}

impl MockCommand {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn code(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    /// Extra copies requested by SendPacket or SendAndListen.
    pub fn repeat_count(&self) -> Option<u8> {
        match self.code() {
            CMD_SEND_PACKET | CMD_SEND_AND_LISTEN => self.bytes.get(2).copied(),
            _ => None,
        }
    }

    /// Firmware-side retries requested by SendAndListen.
    pub fn retry_count(&self) -> Option<u8> {
        match self.code() {
            CMD_SEND_AND_LISTEN => self.bytes.get(9).copied(),
            _ => None,
        }
    }

    /// Radio frame carried by SendPacket or SendAndListen.
    pub fn radio_frame(&self) -> Option<&[u8]> {
        match self.code() {
            CMD_SEND_PACKET => self.bytes.get(4..),
            CMD_SEND_AND_LISTEN => self.bytes.get(10..),
            _ => None,
        }
    }
}

/// How the mock answers one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// What an idle bridge with the configured firmware would say.
    Default,
    /// Exactly these bytes.
    Bytes(Vec<u8>),
    /// Keep listening; the reply comes from a later
    /// [`MockTransport::inject_packet`] or an interrupting command.
    Listen,
    /// No reply at all.
    Silent,
}

impl MockReply {
    /// A successful packet reply carrying `frame`.
    pub fn packet(rssi: i16, frame: &[u8]) -> Self {
        MockReply::Bytes(packet_reply(rssi, 0, frame))
    }

    pub fn code(code: ResponseCode) -> Self {
        MockReply::Bytes(vec![code.to_byte()])
    }
}

fn packet_reply(rssi: i16, sequence: u8, frame: &[u8]) -> Vec<u8> {
    let packet = RadioPacket {
        rssi,
        sequence,
        data: frame.to_vec(),
    };
    let mut reply = vec![RESP_CODE_SUCCESS];
    reply.extend_from_slice(&packet.to_rfspy());
    reply
}

type Handler = Box<dyn FnMut(&MockCommand) -> MockReply + Send>;

struct MockState {
    connection: ConnectionState,
    firmware: String,
    legacy: bool,
    commands: Vec<MockCommand>,
    handler: Option<Handler>,
    listening: bool,
    packet_sequence: u8,
    custom_name: Option<String>,
    idle_signal: bool,
    capture_on_interrupt: Option<(i16, Vec<u8>)>,
}

/// Scriptable in-memory bridge.
pub struct MockTransport {
    state: Mutex<MockState>,
    reply_tx: mpsc::UnboundedSender<Vec<u8>>,
    reply_rx: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MockTransport {
    /// A connected bridge reporting `firmware` as its version.
    pub fn new(firmware: &str) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let legacy = FirmwareVersion::parse(firmware).is_some_and(|v| v.is_legacy());
        MockTransport {
            state: Mutex::new(MockState {
                connection: ConnectionState::Connected,
                firmware: firmware.to_string(),
                legacy,
                commands: Vec::new(),
                handler: None,
                listening: false,
                packet_sequence: 0,
                custom_name: None,
                idle_signal: false,
                capture_on_interrupt: None,
            }),
            reply_tx,
            reply_rx: AsyncMutex::new(reply_rx),
        }
    }

    /// Answer commands with `handler`; [`MockReply::Default`] falls back to
    /// the built-in replies.
    pub fn set_handler(&self, handler: impl FnMut(&MockCommand) -> MockReply + Send + 'static) {
        self.state.lock().handler = Some(Box::new(handler));
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.state.lock().connection = state;
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> Vec<MockCommand> {
        self.state.lock().commands.clone()
    }

    pub fn command_codes(&self) -> Vec<u8> {
        self.state.lock().commands.iter().map(|c| c.code()).collect()
    }

    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    /// True while a listen command waits for a packet.
    pub fn is_listening(&self) -> bool {
        self.state.lock().listening
    }

    pub fn idle_signal(&self) -> bool {
        self.state.lock().idle_signal
    }

    /// Deliver a packet to the pending listen. Returns false when nothing
    /// is listening.
    pub fn inject_packet(&self, rssi: i16, frame: &[u8]) -> bool {
        let mut state = self.state.lock();
        if !std::mem::take(&mut state.listening) {
            return false;
        }
        let sequence = state.packet_sequence;
        state.packet_sequence = sequence.wrapping_add(1);
        self.queue(packet_reply(rssi, sequence, frame));
        true
    }

    /// Have the pending listen catch `frame` just before the next command
    /// arrives: the bridge answers the listen with the packet instead of
    /// `CmdInterrupted`.
    pub fn capture_on_interrupt(&self, rssi: i16, frame: &[u8]) {
        self.state.lock().capture_on_interrupt = Some((rssi, frame.to_vec()));
    }

    /// Deliver `reply` now, e.g. a late answer to a command the host gave
    /// up on.
    pub fn push_reply(&self, reply: &[u8]) {
        self.queue(reply.to_vec());
    }

    fn queue(&self, reply: Vec<u8>) {
        // The receiver lives as long as the transport.
        let _ = self.reply_tx.send(reply);
    }

    fn default_reply(state: &MockState, command: &MockCommand) -> MockReply {
        let legacy = state.legacy;
        match command.code() {
            CMD_GET_VERSION => {
                let mut reply = Vec::new();
                if !legacy {
                    reply.push(RESP_CODE_SUCCESS);
                }
                reply.extend_from_slice(state.firmware.as_bytes());
                MockReply::Bytes(reply)
            }
            CMD_GET_PACKET => MockReply::Listen,
            CMD_SEND_AND_LISTEN => MockReply::code(ResponseCode::RxTimeout),
            CMD_READ_REGISTER => MockReply::Bytes(vec![RESP_CODE_SUCCESS, 0]),
            CMD_UPDATE_REGISTER if legacy => MockReply::Bytes(vec![LEGACY_REGISTER_SUCCESS]),
            CMD_RESET => MockReply::Silent,
            _ if legacy => MockReply::Bytes(Vec::new()),
            _ => MockReply::code(ResponseCode::Success),
        }
    }
}

#[async_trait]
impl BridgeTransport for MockTransport {
    fn state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let command = MockCommand {
            bytes: decode_write(data)
                .map_err(|e| TransportError::Io(e.to_string()))?
                .to_vec(),
        };

        let mut state = self.state.lock();
        if state.connection != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        state.commands.push(command.clone());

        if std::mem::take(&mut state.listening) {
            match state.capture_on_interrupt.take() {
                Some((rssi, frame)) => {
                    let sequence = state.packet_sequence;
                    state.packet_sequence = sequence.wrapping_add(1);
                    self.queue(packet_reply(rssi, sequence, &frame));
                }
                None => self.queue(vec![RESP_CODE_CMD_INTERRUPTED]),
            }
        }

        let mut reply = match state.handler.as_mut() {
            Some(handler) => handler(&command),
            None => MockReply::Default,
        };
        if reply == MockReply::Default {
            reply = Self::default_reply(&state, &command);
        }
        match reply {
            MockReply::Bytes(bytes) => self.queue(bytes),
            MockReply::Listen => state.listening = true,
            MockReply::Silent | MockReply::Default => {}
        }
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let mut replies = self.reply_rx.lock().await;
        match tokio::time::timeout(timeout, replies.recv()).await {
            Ok(Some(reply)) => Ok(Some(reply)),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn set_custom_name(&self, name: &str) -> Result<(), TransportError> {
        self.state.lock().custom_name = Some(name.to_string());
        Ok(())
    }

    fn custom_name(&self) -> Option<String> {
        self.state.lock().custom_name.clone()
    }

    async fn set_idle_signal(&self, enabled: bool) -> Result<(), TransportError> {
        self.state.lock().idle_signal = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlink_bridge_protocol::{encode_write, BridgeCommand, CMD_GET_STATE};

    #[tokio::test]
    async fn test_listen_is_interrupted_by_next_command() {
        let mock = MockTransport::new("subg_rfspy 2.2");
        let get_packet = encode_write(
            &BridgeCommand::GetPacket {
                channel: 0,
                timeout_ms: 0,
            }
            .encode(),
        )
        .expect("should frame");
        mock.send(&get_packet).await.expect("should send");
        assert!(mock.is_listening());

        let get_state = encode_write(&BridgeCommand::GetState.encode()).expect("should frame");
        mock.send(&get_state).await.expect("should send");
        assert!(!mock.is_listening());

        let first = mock.receive(Duration::from_millis(10)).await.expect("should receive");
        let second = mock.receive(Duration::from_millis(10)).await.expect("should receive");
        assert_eq!(first, Some(vec![RESP_CODE_CMD_INTERRUPTED]));
        assert_eq!(second, Some(vec![RESP_CODE_SUCCESS]));
        assert_eq!(mock.command_codes(), vec![CMD_GET_PACKET, CMD_GET_STATE]);
    }

    #[test]
    fn test_command_accessors() {
        let command = BridgeCommand::SendAndListen {
            send_channel: 0,
            repeat_count: 2,
            delay_ms: 0,
            listen_channel: 0,
            timeout_ms: 180,
            retry_count: 0,
            data: vec![0xa7, 0x01],
        };
        let mock = MockCommand {
            bytes: command.encode(),
        };
        assert_eq!(mock.code(), CMD_SEND_AND_LISTEN);
        assert_eq!(mock.repeat_count(), Some(2));
        assert_eq!(mock.retry_count(), Some(0));
        assert_eq!(mock.radio_frame(), Some(&[0xa7, 0x01][..]));
    }

    #[tokio::test]
    async fn test_listen_catches_packet_before_next_command() {
        let mock = MockTransport::new("subg_rfspy 2.2");
        let get_packet = encode_write(
            &BridgeCommand::GetPacket {
                channel: 0,
                timeout_ms: 0,
            }
            .encode(),
        )
        .expect("should frame");
        mock.send(&get_packet).await.expect("should send");
        mock.capture_on_interrupt(-60, &[0xa7, 0x01]);

        let get_state = encode_write(&BridgeCommand::GetState.encode()).expect("should frame");
        mock.send(&get_state).await.expect("should send");

        let first = mock.receive(Duration::from_millis(10)).await.expect("should receive");
        let second = mock.receive(Duration::from_millis(10)).await.expect("should receive");
        assert_eq!(first, Some(packet_reply(-60, 0, &[0xa7, 0x01])));
        assert_eq!(second, Some(vec![RESP_CODE_SUCCESS]));
    }

    #[test]
    fn test_inject_without_listen() {
        let mock = MockTransport::new("subg_rfspy 2.2");
        assert!(!mock.inject_packet(-60, &[0x01, 0x02]));
    }
}
