//! Event envelopes.
//!
//! An envelope names its event and carries an optional acknowledgment id and
//! an arbitrary `data` value. Decoding happens in two steps: the text is
//! parsed into a generic [`Envelope`], then the event name selects the typed
//! frame. Unknown events are reported separately from malformed text so the
//! caller can log them at different levels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::{ProtoError, Result},
    payloads::{AckPayload, OutgoingMessage, RawMessage},
};

const EVENT_MESSAGE: &str = "message";
const EVENT_RECENT: &str = "recent-messages";
const EVENT_ERROR: &str = "error";
const EVENT_ACK: &str = "ack";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encode(e.to_string()))
    }
}

/// Event pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// A single chat message.
    Message(RawMessage),

    /// Authoritative recent-history snapshot, oldest first.
    RecentMessages(Vec<RawMessage>),

    /// Server-side error report. Usually a string.
    Error(Value),

    /// Acknowledgment for the outbound message with the same id.
    Ack {
        /// Id the client attached to the outbound message.
        id: u64,
        /// `None` when the server answered without a body.
        ack: Option<AckPayload>,
    },
}

impl ServerFrame {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtoError::Malformed` if the text is not an envelope, an ack has no
    ///   id, or a snapshot is neither an array nor null
    /// - `ProtoError::UnknownEvent` for event names outside the protocol
    pub fn decode(text: &str) -> Result<Self> {
        let envelope = Envelope::parse(text)?;

        match envelope.event.as_str() {
            EVENT_MESSAGE => Ok(Self::Message(RawMessage::from_value(envelope.data))),
            EVENT_RECENT => match envelope.data {
                Value::Array(entries) => {
                    Ok(Self::RecentMessages(entries.into_iter().map(RawMessage::from_value).collect()))
                },
                Value::Null => Ok(Self::RecentMessages(Vec::new())),
                other => Err(ProtoError::Malformed(format!(
                    "recent-messages expects an array, got {}",
                    json_kind(&other)
                ))),
            },
            EVENT_ERROR => Ok(Self::Error(envelope.data)),
            EVENT_ACK => {
                let Some(id) = envelope.id else {
                    return Err(ProtoError::Malformed("ack without id".to_string()));
                };
                let ack = match envelope.data {
                    Value::Null => None,
                    // A body that is not an ack object still counts as a
                    // response, and an unexplained one is a rejection.
                    data => Some(
                        serde_json::from_value::<AckPayload>(data)
                            .unwrap_or_else(|_| AckPayload::rejected(None)),
                    ),
                };
                Ok(Self::Ack { id, ack })
            },
            other => Err(ProtoError::UnknownEvent(other.to_string())),
        }
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        let envelope = match self {
            Self::Message(raw) => Envelope {
                event: EVENT_MESSAGE.to_string(),
                id: None,
                data: serde_json::to_value(raw).map_err(|e| ProtoError::Encode(e.to_string()))?,
            },
            Self::RecentMessages(raws) => Envelope {
                event: EVENT_RECENT.to_string(),
                id: None,
                data: serde_json::to_value(raws).map_err(|e| ProtoError::Encode(e.to_string()))?,
            },
            Self::Error(data) => {
                Envelope { event: EVENT_ERROR.to_string(), id: None, data: data.clone() }
            },
            Self::Ack { id, ack } => Envelope {
                event: EVENT_ACK.to_string(),
                id: Some(*id),
                data: match ack {
                    Some(ack) => {
                        serde_json::to_value(ack).map_err(|e| ProtoError::Encode(e.to_string()))?
                    },
                    None => Value::Null,
                },
            },
        };
        envelope.to_text()
    }
}

/// Event sent by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Chat message awaiting acknowledgment under `id`.
    Message {
        /// Acknowledgment id echoed back in the server's `ack` frame.
        id: u64,
        /// Message body.
        message: OutgoingMessage,
    },
}

impl ClientFrame {
    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Message { id, message } => Envelope {
                event: EVENT_MESSAGE.to_string(),
                id: Some(*id),
                data: serde_json::to_value(message)
                    .map_err(|e| ProtoError::Encode(e.to_string()))?,
            }
            .to_text(),
        }
    }

    /// Decode a text frame (server side and tests).
    pub fn decode(text: &str) -> Result<Self> {
        let envelope = Envelope::parse(text)?;

        match envelope.event.as_str() {
            EVENT_MESSAGE => {
                let Some(id) = envelope.id else {
                    return Err(ProtoError::Malformed("message without ack id".to_string()));
                };
                let message = serde_json::from_value(envelope.data)?;
                Ok(Self::Message { id, message })
            },
            other => Err(ProtoError::UnknownEvent(other.to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
