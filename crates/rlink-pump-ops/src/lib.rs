//! Pump operations over a radio bridge.
//!
//! [`PumpSequencer`] composes the packet codec and a bridge command session
//! into pump-level operations: waking the pump, querying its model and
//! battery, pressing buttons, reading history and tuning the radio. Radio
//! links are lossy and pumps sleep, so every exchange is a bounded
//! send/retry/listen cycle and the sequencer wakes the pump before talking
//! to it.
//!
//! [`PumpOps`] wraps the sequencer for callers sharing a bridge: it checks
//! firmware compatibility and runs each operation in its own session.
//!
//! ```rust,ignore
//! let settings = PumpSettings::load("pump.yaml")?;
//! let ops = PumpOps::new(device, settings);
//! if ops.wakeup(Duration::from_secs(600)).await? {
//!     println!("model {}", ops.get_pump_model().await?);
//! }
//! ```

pub mod config;
pub mod error;
pub mod ops;
pub mod sequencer;
pub mod state;

pub use config::*;
pub use error::*;
pub use ops::*;
pub use sequencer::*;
pub use state::*;
