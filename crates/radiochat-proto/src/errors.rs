//! Codec errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors produced while encoding or decoding envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Frame text is not a valid envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Envelope names an event this client does not understand.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Outbound envelope could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
