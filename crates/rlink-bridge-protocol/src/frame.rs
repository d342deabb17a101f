//! BLE write framing.
//!
//! Commands are written to the bridge's data characteristic with a one-byte
//! length prefix:
//!
//! ```text
//! +-----+-------------------+
//! | len | command[0..len]   |
//! +-----+-------------------+
//! ```
//!
//! Older `ble_rfspy` firmware delivers a reply in several notifications and
//! marks its end with a zero byte; [`ResponseBuffer`] reassembles those.

use bytes::{Buf, BytesMut};

use crate::constants::MAX_WRITE_LEN;
use crate::error::*;

/// Prefix `command` with its length for a single BLE write.
pub fn encode_write(command: &[u8]) -> Result<Vec<u8>> {
    if command.len() > MAX_WRITE_LEN {
        return Err(BridgeError::WriteTooLong {
            max: MAX_WRITE_LEN,
            actual: command.len(),
        });
    }
    let mut buf = Vec::with_capacity(command.len() + 1);
    buf.push(command.len() as u8);
    buf.extend_from_slice(command);
    log::trace!("BLE write {}", hex::encode(&buf));
    Ok(buf)
}

/// Strip and check the length prefix of a BLE write.
pub fn decode_write(write: &[u8]) -> Result<&[u8]> {
    let (&len, command) = write
        .split_first()
        .ok_or_else(|| BridgeError::MalformedWrite("empty write".into()))?;
    if len as usize != command.len() {
        return Err(BridgeError::MalformedWrite(format!(
            "length byte {} but {} bytes follow",
            len,
            command.len()
        )));
    }
    Ok(command)
}

/// Reassembles zero-terminated replies from buffered firmware.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    buffer: BytesMut,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        ResponseBuffer {
            buffer: BytesMut::with_capacity(MAX_WRITE_LEN),
        }
    }

    /// Add a notification's bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete reply, without its terminator.
    ///
    /// Returns `None` until a terminator has arrived.
    pub fn decode(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|&b| b == 0)?;
        let reply = self.buffer.split_to(end).to_vec();
        self.buffer.advance(1);
        Some(reply)
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
