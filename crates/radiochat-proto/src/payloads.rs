//! Message payloads carried inside envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat message exactly as the server sent it.
///
/// Every field is optional and may carry any JSON type. Nothing here is
/// trusted: the core crate decides what is admissible and how missing or
/// mistyped fields are defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    /// Server-issued identifier, if any.
    pub id: Value,
    /// Author object (`{"name": ..., "avatar": ...}`).
    pub user: Value,
    /// Message body.
    pub content: Value,
    /// Send time: a date string or unix milliseconds.
    pub timestamp: Value,
}

impl RawMessage {
    /// Raw message with only content set.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: Value::String(content.into()), ..Self::default() }
    }

    /// Decode a single array entry or `data` value.
    ///
    /// Non-object values produce an empty message, which is later rejected for
    /// having no content.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Value::String(id.into());
        self
    }

    /// Set the author.
    #[must_use]
    pub fn with_user(mut self, name: impl Into<String>, avatar: Option<&str>) -> Self {
        let mut user = serde_json::Map::new();
        user.insert("name".to_string(), Value::String(name.into()));
        if let Some(avatar) = avatar {
            user.insert("avatar".to_string(), Value::String(avatar.to_string()));
        }
        self.user = Value::Object(user);
        self
    }

    /// Set the timestamp to an arbitrary JSON value.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Value) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Identifier as a string. `None` if absent, blank, or not a scalar.
    pub fn id(&self) -> Option<String> {
        match &self.id {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Content if it is a string. Not trimmed.
    pub fn content(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// Author fields that are present and stringly typed.
    pub fn user(&self) -> RawUser {
        let field = |key: &str| self.user.get(key).and_then(Value::as_str).map(str::to_string);
        RawUser { name: field("name"), avatar: field("avatar") }
    }
}

/// Author fields extracted from a [`RawMessage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUser {
    /// Display name, untrimmed.
    pub name: Option<String>,
    /// Avatar reference, untrimmed.
    pub avatar: Option<String>,
}

/// Author block of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Display name.
    pub name: String,
    /// Avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Message body sent by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Author.
    pub user: UserInfo,
    /// Trimmed, non-empty content.
    pub content: String,
}

/// Server acknowledgment of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPayload {
    /// Whether the server accepted the message.
    pub success: bool,
    /// Rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckPayload {
    /// Positive acknowledgment.
    pub fn accepted() -> Self {
        Self { success: true, error: None }
    }

    /// Negative acknowledgment with an optional reason.
    pub fn rejected(reason: Option<&str>) -> Self {
        Self { success: false, error: reason.map(str::to_string) }
    }
}
