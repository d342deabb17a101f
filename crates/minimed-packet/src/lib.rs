//! Minimed RF packet codec.
//!
//! Pumps talk over a sub-GHz link using 4b6b-encoded frames protected by a
//! trailing CRC-8. This crate turns those frames into typed [`Packet`]s and
//! interprets packet payloads as [`Message`]s through data-driven bit-field
//! maps.
//!
//! # Frame Layout
//!
//! ```text
//! decoded: | packet type | address (3) | message type | body ... | crc8 |
//! on air:  4b6b(decoded)
//! ```
//!
//! # Example
//!
//! ```rust
//! use minimed_packet::{decode_frame, encode_frame, Message, PacketType};
//!
//! let frame = encode_frame(&hex::decode("a23505350a93ce8aa000").unwrap());
//! let packet = decode_frame(&frame).unwrap();
//! assert_eq!(packet.packet_type(), PacketType::Sentry);
//! assert_eq!(packet.address().to_string(), "350535");
//!
//! match Message::from_packet(&packet) {
//!     Some(Message::DeviceLink(link)) => assert_eq!(link.sequence(), 19),
//!     other => panic!("unexpected message: {:?}", other),
//! }
//! ```

mod bits;
mod crc;
mod error;
mod fourbsixb;
mod message_type;
mod messages;
mod packet;
mod pump_message;

pub use bits::*;
pub use crc::*;
pub use error::*;
pub use fourbsixb::*;
pub use message_type::*;
pub use messages::*;
pub use packet::*;
pub use pump_message::*;
