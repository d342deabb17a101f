//! Error types for minimed-history.

use thiserror::Error;

/// Errors from history handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Page CRC does not match its contents.
    #[error("history page CRC mismatch: computed 0x{computed:04x}, stored 0x{stored:04x}")]
    InvalidCrc {
        /// CRC over the page body.
        computed: u16,
        /// CRC stored in the last two bytes.
        stored: u16,
    },

    /// Page is too short to hold a CRC.
    #[error("history page too short: {0} bytes")]
    TooShort(usize),

    /// Model string not in the model table.
    #[error("unknown pump model: {0}")]
    UnknownPumpModel(String),
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
