//! Message reconciler: the only writer of the canonical message log.
//!
//! Turns raw inbound events into admitted [`Message`]s. Incremental messages
//! are deduplicated by id against a bounded [`IdentityCache`]; snapshots are
//! authoritative and replace both the log and the cache wholesale.

use std::collections::HashSet;

use radiochat_proto::RawMessage;
use tracing::debug;

use crate::{
    env::Environment,
    identity_cache::{DEFAULT_CACHE_CAPACITY, IdentityCache},
    message::{Message, MessageId},
};

/// Author name used when a payload carries none.
pub const DEFAULT_FALLBACK_AUTHOR: &str = "Anonymous";

/// Reconciler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Identity cache capacity.
    pub cache_capacity: usize,
    /// Author name substituted for missing or blank names.
    pub fallback_author: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fallback_author: DEFAULT_FALLBACK_AUTHOR.to_string(),
        }
    }
}

/// Observable result of a log mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A single message was appended.
    MessageAdmitted(Message),
    /// The log was replaced by a non-empty snapshot.
    SnapshotReplaced {
        /// Number of messages now in the log.
        count: usize,
    },
}

/// Why an inbound message was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Content missing or blank after trimming.
    EmptyContent,
    /// Id already seen.
    Duplicate(MessageId),
}

/// Owns the canonical message log and the identity cache.
#[derive(Debug, Clone)]
pub struct Reconciler {
    log: Vec<Message>,
    cache: IdentityCache,
    fallback_author: String,
}

impl Reconciler {
    /// Create an empty reconciler.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            log: Vec::new(),
            cache: IdentityCache::new(config.cache_capacity),
            fallback_author: config.fallback_author,
        }
    }

    /// Admit a single inbound message.
    ///
    /// On success the message has been appended to the log and its id
    /// remembered. Rejections leave all state untouched.
    pub fn admit<E: Environment>(
        &mut self,
        raw: &RawMessage,
        env: &E,
    ) -> Result<ReconcileEvent, Rejection> {
        let Some(message) = Message::decode(raw, &self.fallback_author, env) else {
            debug!("rejected inbound message with empty content");
            return Err(Rejection::EmptyContent);
        };

        if self.cache.contains(&message.id) {
            debug!(id = %message.id, "rejected duplicate message");
            return Err(Rejection::Duplicate(message.id));
        }

        if let Some(evicted) = self.cache.insert(message.id.clone()) {
            debug!(id = %evicted, "evicted id from identity cache");
        }
        self.log.push(message.clone());
        Ok(ReconcileEvent::MessageAdmitted(message))
    }

    /// Replace the log with an authoritative snapshot.
    ///
    /// The identity cache is cleared first. Entries with blank content are
    /// dropped, as are repeats of an id earlier in the same snapshot. Returns
    /// `None` when nothing survives, in which case the log is left empty.
    pub fn apply_snapshot<E: Environment>(
        &mut self,
        entries: &[RawMessage],
        env: &E,
    ) -> Option<ReconcileEvent> {
        self.cache.clear();
        let mut log = Vec::with_capacity(entries.len());
        let mut seen = HashSet::with_capacity(entries.len());

        for raw in entries {
            let Some(message) = Message::decode(raw, &self.fallback_author, env) else {
                continue;
            };
            if !seen.insert(message.id.clone()) {
                debug!(id = %message.id, "dropped repeated id within snapshot");
                continue;
            }
            self.cache.insert(message.id.clone());
            log.push(message);
        }

        self.log = log;
        debug!(count = self.log.len(), skipped = entries.len() - self.log.len(), "applied snapshot");

        if self.log.is_empty() {
            None
        } else {
            Some(ReconcileEvent::SnapshotReplaced { count: self.log.len() })
        }
    }

    /// Empty the log and the identity cache.
    pub fn clear(&mut self) {
        self.log.clear();
        self.cache.clear();
    }

    /// Admitted messages in admission order.
    pub fn messages(&self) -> &[Message] {
        &self.log
    }

    /// Identity cache backing duplicate suppression.
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}
