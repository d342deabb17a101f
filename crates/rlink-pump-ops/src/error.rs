//! Error types for pump operations and settings.

use minimed_history::HistoryError;
use minimed_packet::{MessageType, PumpErrorCode};
use rlink_session::SessionError;
use thiserror::Error;

/// Errors from pump operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PumpOpsError {
    /// A bridge command failed outside the retry policy.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Every send/listen attempt went unanswered.
    #[error("no response to {message:?} after {attempts} attempts")]
    NoResponse {
        /// Message that was sent.
        message: MessageType,
        /// Send attempts made.
        attempts: u32,
    },

    /// The bridge firmware cannot run pump operations.
    #[error("bridge firmware {0:?} is not compatible")]
    FirmwareIncompatible(Option<String>),

    /// The pump answered, but not with what was asked for.
    #[error("unexpected {received} in reply to {sent:?}")]
    UnexpectedResponse {
        /// Message that was sent.
        sent: MessageType,
        /// What came back.
        received: String,
    },

    /// The pump refused the command.
    #[error("pump refused {message:?}: {code:?}")]
    PumpRefused {
        /// Message that was sent.
        message: MessageType,
        /// Error code from the pump.
        code: PumpErrorCode,
    },

    /// The pump reported a model this crate does not know.
    #[error("unknown pump model {0:?}")]
    UnknownPumpModel(String),

    /// A history page failed validation.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// History frames stopped before a full page arrived.
    #[error("history page {page} incomplete: {len} of 1024 bytes")]
    IncompleteHistoryPage {
        /// Page number.
        page: u8,
        /// Bytes received.
        len: usize,
    },

    /// No frequency in the scan band got an answer.
    #[error("pump did not answer on any frequency")]
    PumpNotFound,
}

impl PumpOpsError {
    /// Shorthand for the failure of a retried send/listen.
    pub fn is_no_response(&self) -> bool {
        matches!(self, PumpOpsError::NoResponse { .. })
    }
}

/// Result type for pump operations.
pub type Result<T> = std::result::Result<T, PumpOpsError>;

/// Errors loading or validating [`PumpSettings`](crate::PumpSettings).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
