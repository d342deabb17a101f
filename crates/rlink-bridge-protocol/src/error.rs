//! Protocol error types.

use thiserror::Error;

/// Errors reported by the bridge or found in its replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No packet arrived within the listen timeout.
    #[error("receive timed out")]
    RxTimeout,

    /// The command was interrupted before it completed.
    #[error("command interrupted")]
    CmdInterrupted,

    /// A packet arrived with no payload.
    #[error("received zero-length data")]
    ZeroData,

    /// The bridge rejected the command's parameters.
    #[error("invalid command parameter")]
    InvalidParam,

    /// The bridge firmware does not know this command.
    #[error("command 0x{0:02X} not supported by bridge firmware")]
    UnsupportedCommand(u8),

    /// Reply could not be parsed for the command that was sent.
    #[error("invalid response: {}", hex::encode(.0))]
    InvalidResponse(Vec<u8>),

    /// Command does not fit in a single BLE write.
    #[error("command too long: maximum {max} bytes, got {actual}")]
    WriteTooLong {
        /// Maximum command length.
        max: usize,
        /// Actual command length.
        actual: usize,
    },

    /// Write is missing its length prefix or the prefix disagrees with the data.
    #[error("malformed write: {0}")]
    MalformedWrite(String),
}

impl BridgeError {
    /// True for failures the pump retry policy may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::RxTimeout | BridgeError::ZeroData)
    }
}

/// Result type for bridge protocol operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
