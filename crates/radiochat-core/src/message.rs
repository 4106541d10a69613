//! Strict internal message model and the decode step that produces it.
//!
//! Inbound payloads are [`RawMessage`]s with every field optional and
//! untyped. [`Message::decode`] is the only way to turn one into a
//! [`Message`]: blank content is rejected, everything else that is missing or
//! malformed is defaulted.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use radiochat_proto::RawMessage;
use serde_json::Value;

use crate::env::Environment;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const GENERATED_SUFFIX_LEN: usize = 9;

/// Opaque message identifier.
///
/// Server-issued for every message the server knows about; generated locally
/// (`msg_<millis>_<base36>`) when an inbound payload arrives without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a collision-resistant id from wall-clock time and randomness.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut entropy = env.random_u64();
        let suffix: String = (0..GENERATED_SUFFIX_LEN)
            .map(|_| {
                let digit = BASE36[(entropy % 36) as usize] as char;
                entropy /= 36;
                digit
            })
            .collect();
        Self(format!("msg_{}_{suffix}", env.wall_clock_millis()))
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Display name. Never blank.
    pub name: String,
    /// Avatar reference.
    pub avatar: Option<String>,
}

/// An admitted chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique within the visible log.
    pub id: MessageId,
    /// Author.
    pub author: Author,
    /// Trimmed, never empty.
    pub content: String,
    /// Always a valid instant.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Decode and normalize a raw payload.
    ///
    /// Returns `None` when the content is missing, not a string, or blank.
    /// A missing id is generated, a blank author becomes `fallback_author`,
    /// and an unusable timestamp becomes the environment's current time.
    pub fn decode<E: Environment>(raw: &RawMessage, fallback_author: &str, env: &E) -> Option<Self> {
        let content = raw.content()?.trim();
        if content.is_empty() {
            return None;
        }

        let id = raw.id().map_or_else(|| MessageId::generate(env), MessageId::new);
        let user = raw.user();
        let name = user
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(fallback_author)
            .to_string();
        let avatar = user.avatar.filter(|avatar| !avatar.trim().is_empty());

        Some(Self {
            id,
            author: Author { name, avatar },
            content: content.to_string(),
            timestamp: normalize_timestamp(&raw.timestamp, env.wall_clock_millis()),
        })
    }

    /// First letter of the author name, uppercased. `?` if there is none.
    pub fn initial(&self) -> char {
        self.author
            .name
            .chars()
            .find(|c| c.is_alphanumeric())
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }

    /// Local wall-clock label (`HH:MM:SS`).
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}

/// Coerce a loosely-typed timestamp into a valid instant.
///
/// Strings are tried as RFC 3339, RFC 2822, then naive `YYYY-MM-DD[T ]HH:MM:SS`
/// in UTC. Numbers are unix milliseconds. Anything else falls back to
/// `now_millis`.
pub fn normalize_timestamp(value: &Value, now_millis: i64) -> DateTime<Utc> {
    let parsed = match value {
        Value::String(text) => parse_time_text(text.trim()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    };

    parsed.or_else(|| DateTime::from_timestamp_millis(now_millis)).unwrap_or_default()
}

fn parse_time_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|naive| naive.and_utc())
        })
}
