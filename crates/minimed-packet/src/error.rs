//! Error types for minimed-packet.

use thiserror::Error;

/// Ways a 4b6b stream can be malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFault {
    /// A 6-bit group that is not in the symbol table.
    InvalidSymbol {
        /// Index of the offending symbol in the stream.
        index: usize,
        /// The raw 6-bit value.
        symbol: u8,
    },
    /// The stream ends halfway through a byte.
    OddNibbleCount,
    /// Bits after the last symbol are not zero.
    NonZeroPadding,
}

impl std::fmt::Display for EncodingFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingFault::InvalidSymbol { index, symbol } => {
                write!(f, "invalid symbol 0x{:02x} at index {}", symbol, index)
            }
            EncodingFault::OddNibbleCount => write!(f, "odd nibble count"),
            EncodingFault::NonZeroPadding => write!(f, "non-zero padding bits"),
        }
    }
}

/// Errors produced while turning radio bytes into a [`Packet`](crate::Packet).
///
/// A frame error is fatal to that frame only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The trailing CRC-8 does not match the decoded payload.
    #[error("checksum mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    ChecksumMismatch {
        /// CRC computed over the payload.
        expected: u8,
        /// CRC carried by the frame.
        actual: u8,
    },

    /// The 4b6b layer could not be reversed.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(EncodingFault),

    /// Decoded frame is too short to hold the header and CRC.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// First header byte is not a known packet type.
    #[error("unknown packet type: 0x{0:02x}")]
    UnknownPacketType(u8),
}

/// Errors produced by bit-field access and message interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Field name not present in the message's field map.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Value does not fit the field's bit width.
    #[error("value {value} does not fit {width}-bit field {field}")]
    ValueOutOfRange {
        /// Field name.
        field: String,
        /// Rejected value.
        value: u32,
        /// Declared width in bits.
        width: usize,
    },

    /// Bit index beyond the end of the message.
    #[error("bit {index} out of range for {len}-byte message")]
    BitOutOfRange {
        /// Requested bit.
        index: usize,
        /// Message length in bytes.
        len: usize,
    },

    /// A field map whose fields do not fit the declared message length.
    #[error("invalid field map: {0}")]
    InvalidFieldMap(String),

    /// Message body is shorter than its layout requires.
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Required length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

impl DecodeError {
    /// Create an unknown field error.
    pub fn unknown_field(name: impl Into<String>) -> Self {
        DecodeError::UnknownField(name.into())
    }

    /// Create an invalid field map error.
    pub fn invalid_map(message: impl Into<String>) -> Self {
        DecodeError::InvalidFieldMap(message.into())
    }
}

/// Result type for frame decoding.
pub type FrameResult<T> = std::result::Result<T, FrameError>;
