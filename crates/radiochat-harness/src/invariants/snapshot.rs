//! Observable state snapshots for invariant checking.

use radiochat_app::ChatState;
use radiochat_core::{Message, Reconciler};

/// Message log plus, when taken from a reconciler, its identity cache size.
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    /// Visible messages in admission order.
    pub messages: Vec<Message>,
    /// Identity cache occupancy and capacity. `None` for published state.
    pub cache: Option<(usize, usize)>,
}

impl ChatSnapshot {
    /// Snapshot of state published by a running service.
    pub fn from_state(state: &ChatState) -> Self {
        Self { messages: state.messages.clone(), cache: None }
    }

    /// Snapshot of a reconciler, including its cache.
    pub fn from_reconciler(reconciler: &Reconciler) -> Self {
        let cache = reconciler.cache();
        Self { messages: reconciler.messages().to_vec(), cache: Some((cache.len(), cache.capacity())) }
    }
}
