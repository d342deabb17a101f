//! Session error types.

use rlink_bridge_protocol::BridgeError;
use thiserror::Error;

/// Failures reported by a [`BridgeTransport`](crate::BridgeTransport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peripheral is not connected.
    #[error("not connected")]
    NotConnected,

    /// The connection went away while waiting.
    #[error("connection closed")]
    Closed,

    /// Any other link-level failure.
    #[error("transport I/O: {0}")]
    Io(String),
}

/// Errors from running commands on a bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The bridge answered with a failure, or with a reply that did not parse.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The bridge never answered.
    #[error("no reply to {command} within {timeout_ms} ms")]
    ResponseTimeout {
        /// Command that was sent.
        command: &'static str,
        /// Time waited.
        timeout_ms: u64,
    },

    /// The transport reports the bridge is not connected.
    #[error("bridge disconnected")]
    Disconnected,

    /// The link itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connected firmware lacks the command.
    #[error("{0} is not supported by this bridge firmware")]
    Unsupported(&'static str),
}

impl SessionError {
    /// Nothing was heard; a resend may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Bridge(e) => e.is_retryable(),
            SessionError::ResponseTimeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(SessionError::Bridge(BridgeError::RxTimeout).is_retryable());
        assert!(SessionError::ResponseTimeout {
            command: "GetPacket",
            timeout_ms: 10
        }
        .is_retryable());
        assert!(!SessionError::Bridge(BridgeError::CmdInterrupted).is_retryable());
        assert!(!SessionError::Disconnected.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = SessionError::ResponseTimeout {
            command: "SendAndListen",
            timeout_ms: 2500,
        };
        assert_eq!(err.to_string(), "no reply to SendAndListen within 2500 ms");
        assert_eq!(
            SessionError::from(BridgeError::ZeroData).to_string(),
            "received zero-length data"
        );
    }
}
