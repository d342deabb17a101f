//! Minimed pump history.
//!
//! A history page is a 1024-byte block of pump memory: variable-length
//! event records followed by a big-endian CRC-16. Record lengths and some
//! field layouts depend on the pump model, which callers supply
//! explicitly.
//!
//! ```rust,ignore
//! use minimed_history::{HistoryPage, PumpModel};
//!
//! let page = HistoryPage::new(raw, "551".parse()?);
//! if page.is_crc_valid() {
//!     for event in page.decode() {
//!         println!("{}", event.to_json(None));
//!     }
//! }
//! ```

mod error;
mod event_type;
mod events;
mod model;
mod page;
mod timestamp;

pub use error::*;
pub use event_type::*;
pub use events::*;
pub use model::*;
pub use page::*;
pub use timestamp::*;
