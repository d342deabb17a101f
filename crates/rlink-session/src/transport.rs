//! The link between the host and a bridge.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Connection state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

/// A connected bridge peripheral.
///
/// Discovery, pairing and reconnection live outside this crate; an
/// implementation only moves bytes and reports state. Writes are complete,
/// length-prefixed commands (see [`rlink_bridge_protocol::encode_write`]) and
/// reads are complete replies, reassembled from notifications with a
/// [`rlink_bridge_protocol::ResponseBuffer`] where the link fragments them.
#[async_trait]
pub trait BridgeTransport: Send + Sync + 'static {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Write one command.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next reply. `Ok(None)` means nothing
    /// arrived in time.
    ///
    /// Must be cancel safe: dropping the future loses no reply.
    async fn receive(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;

    /// Store a user-visible name on the peripheral.
    async fn set_custom_name(&self, name: &str) -> Result<(), TransportError>;

    /// Name stored on the peripheral, if read.
    fn custom_name(&self) -> Option<String>;

    /// Turn the peripheral's periodic idle signal on or off.
    async fn set_idle_signal(&self, enabled: bool) -> Result<(), TransportError>;
}
