//! Standard invariant checks.

use std::collections::HashSet;

use super::{ChatSnapshot, Invariant, InvariantResult, Violation};

/// No message id appears twice in the log.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for (position, message) in state.messages.iter().enumerate() {
            if !seen.insert(&message.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("id {} repeated at position {position}", message.id),
                });
            }
        }
        Ok(())
    }
}

/// Every message has trimmed, non-empty content.
pub struct NonBlankContent;

impl Invariant for NonBlankContent {
    fn name(&self) -> &'static str {
        "non_blank_content"
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        match state
            .messages
            .iter()
            .find(|m| m.content.is_empty() || m.content.trim() != m.content)
        {
            Some(message) => Err(Violation {
                invariant: self.name(),
                message: format!("message {} has content {:?}", message.id, message.content),
            }),
            None => Ok(()),
        }
    }
}

/// Every message has an author name.
pub struct NonBlankAuthor;

impl Invariant for NonBlankAuthor {
    fn name(&self) -> &'static str {
        "non_blank_author"
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        match state.messages.iter().find(|m| m.author.name.trim().is_empty()) {
            Some(message) => Err(Violation {
                invariant: self.name(),
                message: format!("message {} has a blank author", message.id),
            }),
            None => Ok(()),
        }
    }
}

/// The identity cache never exceeds its capacity.
pub struct CacheBound;

impl Invariant for CacheBound {
    fn name(&self) -> &'static str {
        "cache_bound"
    }

    fn check(&self, state: &ChatSnapshot) -> InvariantResult {
        match state.cache {
            Some((len, capacity)) if len > capacity => Err(Violation {
                invariant: self.name(),
                message: format!("identity cache holds {len} ids, capacity {capacity}"),
            }),
            _ => Ok(()),
        }
    }
}
