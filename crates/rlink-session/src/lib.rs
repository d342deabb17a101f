//! Command sessions over a radio bridge.
//!
//! A bridge is a BLE peripheral running `subg_rfspy` radio firmware. This
//! crate serializes access to it: callers run a [`CommandSession`] through
//! [`BridgeDevice::run_session`], and only one session, and so only one
//! command, is ever in flight per device.
//!
//! # Overview
//!
//! - [`BridgeTransport`]: the BLE link, supplied by the application
//! - [`BridgeDevice`]: the per-bridge actor; firmware checks, idle
//!   listening, cancellation, and the packet broadcast
//! - [`CommandSession`]: `do_command` plus typed helpers for registers,
//!   frequency, and send/listen commands
//!
//! # Example
//!
//! ```rust,ignore
//! let device = BridgeDevice::new("bridge-1", transport, SessionConfig::default());
//! device.on_connected().await?;
//! device.enable_idle_listening(0).await?;
//!
//! let packet = device
//!     .run_session("listen", |mut session| async move {
//!         session.get_packet(0, 1_000).await
//!     })
//!     .await?;
//! ```

mod config;
mod device;
mod error;
mod frame;
mod session;
mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::*;
pub use device::*;
pub use error::*;
pub use frame::*;
pub use session::*;
pub use transport::*;
