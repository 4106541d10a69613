//! Delivery coordinator state machine.
//!
//! Turns a send intent into exactly one outcome. Each accepted send receives a
//! [`SendTicket`] that doubles as the acknowledgment id on the wire. A send
//! first waits (briefly) for a usable link, then races the server's
//! acknowledgment against a local deadline; whichever resolves first removes
//! the ticket, so the other is a no-op.
//!
//! Outcomes never touch the message log. The sender's own message appears
//! only when the server echoes it through the normal inbound path.

use std::{
    collections::BTreeMap,
    ops::Sub,
    time::{Duration, Instant},
};

use radiochat_proto::{AckPayload, ClientFrame, OutgoingMessage, UserInfo};
use tracing::{debug, warn};

use crate::error::{DeliveryError, GENERIC_REJECTION};

/// How long a send waits for the link before failing.
pub const DEFAULT_READY_WAIT: Duration = Duration::from_secs(1);

/// How long a transmitted send waits for an acknowledgment before it is
/// assumed delivered.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Delivery configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Wait for a usable link before failing with `NotConnected`
    pub ready_wait: Duration,
    /// Wait for an acknowledgment before resolving optimistically
    pub ack_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { ready_wait: DEFAULT_READY_WAIT, ack_timeout: DEFAULT_ACK_TIMEOUT }
    }
}

/// A user's intent to send a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Message body, untrimmed.
    pub content: String,
    /// Author name, untrimmed.
    pub author: String,
    /// Avatar reference.
    pub avatar: Option<String>,
}

impl SendRequest {
    /// Request without an avatar.
    pub fn new(content: impl Into<String>, author: impl Into<String>) -> Self {
        Self { content: content.into(), author: author.into(), avatar: None }
    }

    /// Attach an avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Wire body, or `None` if content or author is blank.
    pub fn validated(&self) -> Option<OutgoingMessage> {
        let content = self.content.trim();
        let author = self.author.trim();
        if content.is_empty() || author.is_empty() {
            return None;
        }

        let avatar = self.avatar.as_deref().map(str::trim).filter(|a| !a.is_empty());
        Some(OutgoingMessage {
            user: UserInfo { name: author.to_string(), avatar: avatar.map(str::to_string) },
            content: content.to_string(),
        })
    }
}

/// Handle for one in-flight send. Also the acknowledgment id on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SendTicket(pub u64);

/// Transport availability as seen by a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No transport exists.
    Absent,
    /// A transport exists but is not connected.
    Down,
    /// Connected.
    Up,
}

/// Successful send outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The server acknowledged the message.
    Acknowledged,
    /// No acknowledgment arrived; success is assumed.
    Assumed,
    /// Blank content or author; nothing was sent.
    Skipped,
}

/// Actions returned by the delivery coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryAction {
    /// Write this frame to the link.
    Transmit {
        /// Send being transmitted.
        ticket: SendTicket,
        /// Encoded outbound event.
        frame: ClientFrame,
    },
    /// No transport exists: create one.
    Connect,
    /// The transport is down: reconnect it.
    Reconnect,
    /// Report the final outcome to the caller.
    Resolve {
        /// Send being resolved.
        ticket: SendTicket,
        /// Final outcome.
        outcome: Result<Delivery, DeliveryError>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Stage<I> {
    AwaitingLink { since: I },
    AwaitingAck { since: I },
}

#[derive(Debug, Clone)]
struct PendingSend<I> {
    message: OutgoingMessage,
    stage: Stage<I>,
}

/// Delivery coordinator
///
/// Owns every pending send. Pure state machine: the driver performs the
/// returned actions and feeds link readiness, acknowledgments and time back
/// in.
#[derive(Debug, Clone)]
pub struct DeliveryCoordinator<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    config: DeliveryConfig,
    next_ticket: u64,
    pending: BTreeMap<SendTicket, PendingSend<I>>,
}

impl<I> DeliveryCoordinator<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a coordinator with no pending sends.
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config, next_ticket: 1, pending: BTreeMap::new() }
    }

    /// Number of sends not yet resolved.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Accept a send.
    ///
    /// Returns `None` when the request fails validation; the caller reports
    /// [`Delivery::Skipped`]. Otherwise transmits immediately on a live link,
    /// or parks the send until the link is ready. Only the first parked send
    /// asks for a (re)connect.
    pub fn submit(
        &mut self,
        request: &SendRequest,
        link: LinkStatus,
        now: I,
    ) -> Option<(SendTicket, Vec<DeliveryAction>)> {
        let message = request.validated()?;
        let ticket = SendTicket(self.next_ticket);
        self.next_ticket += 1;

        let mut actions = Vec::with_capacity(1);
        let stage = match link {
            LinkStatus::Up => {
                actions.push(transmit(ticket, &message));
                Stage::AwaitingAck { since: now }
            },
            LinkStatus::Absent | LinkStatus::Down => {
                let first_waiter =
                    !self.pending.values().any(|p| matches!(p.stage, Stage::AwaitingLink { .. }));
                if first_waiter {
                    actions.push(if link == LinkStatus::Absent {
                        DeliveryAction::Connect
                    } else {
                        DeliveryAction::Reconnect
                    });
                }
                debug!(ticket = ticket.0, ?link, "send waiting for link");
                Stage::AwaitingLink { since: now }
            },
        };

        self.pending.insert(ticket, PendingSend { message, stage });
        Some((ticket, actions))
    }

    /// The link became usable: transmit every parked send.
    pub fn link_ready(&mut self, now: I) -> Vec<DeliveryAction> {
        let mut actions = Vec::new();
        for (ticket, pending) in &mut self.pending {
            if matches!(pending.stage, Stage::AwaitingLink { .. }) {
                actions.push(transmit(*ticket, &pending.message));
                pending.stage = Stage::AwaitingAck { since: now };
            }
        }
        actions
    }

    /// Apply a server acknowledgment.
    ///
    /// A missing body counts as success. Returns `None` for unknown or already
    /// resolved tickets.
    pub fn acknowledge(
        &mut self,
        ticket: SendTicket,
        ack: Option<AckPayload>,
    ) -> Option<DeliveryAction> {
        if !matches!(self.pending.get(&ticket)?.stage, Stage::AwaitingAck { .. }) {
            return None;
        }
        self.pending.remove(&ticket);

        let outcome = match ack {
            None => Ok(Delivery::Assumed),
            Some(AckPayload { success: true, .. }) => Ok(Delivery::Acknowledged),
            Some(AckPayload { success: false, error }) => {
                let reason = error
                    .filter(|reason| !reason.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_REJECTION.to_string());
                warn!(ticket = ticket.0, %reason, "server rejected message");
                Err(DeliveryError::Rejected(reason))
            },
        };

        Some(DeliveryAction::Resolve { ticket, outcome })
    }

    /// The link refused a transmitted frame.
    pub fn transmit_failed(&mut self, ticket: SendTicket, reason: &str) -> Option<DeliveryAction> {
        self.pending.remove(&ticket)?;
        warn!(ticket = ticket.0, %reason, "transmit failed");
        Some(DeliveryAction::Resolve {
            ticket,
            outcome: Err(DeliveryError::LinkLost(reason.to_string())),
        })
    }

    /// Resolve every send whose deadline has passed.
    ///
    /// Parked sends fail with [`DeliveryError::NotConnected`] once
    /// `ready_wait` has elapsed. Transmitted sends resolve as
    /// [`Delivery::Assumed`] once `ack_timeout` has elapsed.
    pub fn tick(&mut self, now: I) -> Vec<DeliveryAction> {
        let ready_wait = self.config.ready_wait;
        let ack_timeout = self.config.ack_timeout;

        let expired: Vec<(SendTicket, Result<Delivery, DeliveryError>)> = self
            .pending
            .iter()
            .filter_map(|(ticket, pending)| match pending.stage {
                Stage::AwaitingLink { since } if now - since >= ready_wait => {
                    Some((*ticket, Err(DeliveryError::NotConnected)))
                },
                Stage::AwaitingAck { since } if now - since >= ack_timeout => {
                    Some((*ticket, Ok(Delivery::Assumed)))
                },
                _ => None,
            })
            .collect();

        expired
            .into_iter()
            .map(|(ticket, outcome)| {
                self.pending.remove(&ticket);
                match &outcome {
                    Ok(_) => debug!(ticket = ticket.0, "no acknowledgment, assuming delivered"),
                    Err(error) => warn!(ticket = ticket.0, %error, "send failed"),
                }
                DeliveryAction::Resolve { ticket, outcome }
            })
            .collect()
    }

    /// Fail every pending send (service shutdown).
    pub fn stop(&mut self) -> Vec<DeliveryAction> {
        std::mem::take(&mut self.pending)
            .into_keys()
            .map(|ticket| DeliveryAction::Resolve {
                ticket,
                outcome: Err(DeliveryError::Stopped),
            })
            .collect()
    }
}

fn transmit(ticket: SendTicket, message: &OutgoingMessage) -> DeliveryAction {
    DeliveryAction::Transmit {
        ticket,
        frame: ClientFrame::Message { id: ticket.0, message: message.clone() },
    }
}
