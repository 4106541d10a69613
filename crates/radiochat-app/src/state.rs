//! Observable chat state.
//!
//! [`ChatState`] is the view model a UI renders from. It is published as a
//! whole on every change; consumers never see a partially applied update.

use radiochat_core::Message;

/// Snapshot of everything a chat UI renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    /// Admitted messages in admission order.
    pub messages: Vec<Message>,
    /// `None` until the first connection outcome is known.
    pub connected: Option<bool>,
    /// True while any send is outstanding.
    pub loading: bool,
    /// Last human-readable error.
    pub error: Option<String>,
}

impl ChatState {
    /// Whether `name` is used by any author in the log (trimmed,
    /// case-insensitive).
    pub fn name_in_use(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        !wanted.is_empty()
            && self.messages.iter().any(|m| m.author.name.trim().to_lowercase() == wanted)
    }
}
