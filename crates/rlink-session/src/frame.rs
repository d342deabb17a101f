//! Frames captured from the radio.

use chrono::{DateTime, Utc};
use rlink_bridge_protocol::RadioPacket;
use serde::Serialize;

/// Raw radio bytes as received by the bridge.
///
/// Frames are immutable once captured; subscribers each get their own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadioFrame {
    /// Still-encoded frame bytes.
    #[serde(serialize_with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Host time the reply arrived.
    pub captured_at: DateTime<Utc>,
    /// Per-device capture counter, increasing by one per frame.
    pub sequence: u64,
}

impl RadioFrame {
    pub(crate) fn captured(packet: RadioPacket, sequence: u64) -> Self {
        RadioFrame {
            data: packet.data,
            rssi: packet.rssi,
            captured_at: Utc::now(),
            sequence,
        }
    }
}

fn hex_bytes<S: serde::Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}
