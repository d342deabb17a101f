//! Radio Bridge Command Protocol
//!
//! This crate provides types for talking to a BLE radio bridge running
//! `subg_rfspy` firmware. The host writes length-prefixed commands to the
//! bridge's data characteristic; the bridge replies with a response code
//! followed by command-specific data.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → bridge): start with a `CMD_*` byte
//! - **Responses** (bridge → host): start with a `RESP_CODE_*` byte. Firmware
//!   older than 2.0 omits the code on success.
//! - **Packets**: radio packets come back as `[rssi][sequence][data...]`
//!
//! # Example
//!
//! ```rust
//! use rlink_bridge_protocol::{BridgeCommand, BridgeResponse, ResponseCode};
//!
//! let cmd = BridgeCommand::GetPacket { channel: 0, timeout_ms: 1000 };
//! assert_eq!(cmd.encode(), vec![0x03, 0x00, 0x00, 0x00, 0x03, 0xe8]);
//!
//! let reply = BridgeResponse::decode(&cmd, &[0xaa], false).unwrap();
//! assert_eq!(reply.code(), ResponseCode::RxTimeout);
//! ```

mod commands;
mod constants;
mod error;
mod frame;
mod responses;
mod types;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use responses::*;
pub use types::*;
