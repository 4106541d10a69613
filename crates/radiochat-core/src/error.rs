//! Error types for the synchronization core.
//!
//! Two families cross component boundaries as values: [`ConnectionError`] for
//! the transport lifecycle and [`DeliveryError`] for individual sends. Their
//! `Display` text is what the UI shows, so it is written for people.
//! Validation failures and malformed inbound data never become errors; they
//! are rejected or defaulted where they are found.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the connection lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The transport could not be established.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// A connect attempt produced no outcome in time.
    #[error("connection attempt timed out after {elapsed:?}")]
    Timeout {
        /// How long the attempt was outstanding.
        elapsed: Duration,
    },

    /// An established transport went away.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Automatic reconnection gave up.
    #[error("Unable to reach the chat server after {attempts} attempts")]
    Exhausted {
        /// Consecutive failed attempts.
        attempts: u32,
    },
}

impl ConnectionError {
    /// Returns true if automatic retries may still fix this.
    ///
    /// Exhaustion is terminal until the user asks for a reconnect.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

/// Errors resolving a single send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No usable transport within the ready window.
    #[error("Could not send the message: not connected to the chat server")]
    NotConnected,

    /// The server answered with a negative acknowledgment.
    #[error("{0}")]
    Rejected(String),

    /// The transport dropped the frame.
    #[error("Could not send the message: {0}")]
    LinkLost(String),

    /// The chat service was shut down with the send outstanding.
    #[error("Chat service stopped before the message was sent")]
    Stopped,
}

/// Reason shown when the server rejects a message without explanation.
pub const GENERIC_REJECTION: &str = "Failed to send message";
