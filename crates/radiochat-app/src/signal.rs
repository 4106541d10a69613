//! Typed notifications published by the runtime.

use radiochat_core::Message;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Notification for observers that react to changes rather than render
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// [`ChatState`](crate::ChatState) changed.
    StateChanged,
    /// A message was appended to the log.
    MessageAdmitted(Message),
    /// A non-empty snapshot replaced the log. UIs typically reset scroll.
    SnapshotReplaced {
        /// Messages now in the log.
        count: usize,
    },
}

/// Live subscription to [`Signal`]s.
///
/// Dropping it (or calling [`Subscription::unsubscribe`]) detaches it.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Signal>,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<Signal>) -> Self {
        Self { rx }
    }

    /// Next signal. `None` once the service and every handle are gone.
    ///
    /// A subscriber that falls behind skips the signals it missed.
    pub async fn recv(&mut self) -> Option<Signal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "subscriber lagged");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next signal if one is already queued.
    pub fn try_recv(&mut self) -> Option<Signal> {
        loop {
            match self.rx.try_recv() {
                Ok(signal) => return Some(signal),
                Err(TryRecvError::Lagged(_)) => {},
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Detach from the service.
    pub fn unsubscribe(self) {}
}
