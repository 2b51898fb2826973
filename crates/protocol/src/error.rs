//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Line exceeds maximum allowed size.
    #[error("line too large: {size} bytes exceeds maximum of {max} bytes")]
    LineTooLarge {
        /// Actual line size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Peer uses an incompatible protocol version.
    #[error("unsupported protocol version: expected {expected}, got {got}")]
    UnsupportedVersion {
        /// Version this build speaks.
        expected: u8,
        /// Version the peer sent.
        got: u8,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Deserialization(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}
