//! Single-task runtime that owns all chat state.
//!
//! The runtime drives the event loop, coordinating between:
//! - [`ConnectionManager`]: transport lifecycle
//! - [`Reconciler`]: the canonical message log
//! - [`DeliveryCoordinator`]: pending sends
//! - [`Connector`]: transport I/O
//!
//! Commands from handles, link events and timer ticks are processed strictly
//! one at a time, so the state machines need no locking.

use std::collections::HashMap;

use radiochat_client::{Connector, LinkEvent, TransportLink};
use radiochat_core::{
    ConnectionAction, ConnectionManager, ConnectionState, Delivery, DeliveryAction,
    DeliveryCoordinator, DeliveryError, Environment, LifecycleEvent, LinkStatus, ReconcileEvent,
    Reconciler, ReconnectCause, SendRequest, SendTicket, TransportEvent,
};
use radiochat_proto::ServerFrame;
use serde_json::Value;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{ChatConfig, ChatState, Signal};

/// Shown for server error events that carry no text.
const GENERIC_SERVER_ERROR: &str = "Chat connection error";

/// Requests from [`ChatHandle`](crate::ChatHandle)s.
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        request: SendRequest,
        reply: oneshot::Sender<Result<Delivery, DeliveryError>>,
    },
    Reconnect,
    Clear,
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// The current transport link plus whether its event channel has closed.
struct ActiveLink {
    link: TransportLink,
    drained: bool,
}

pub(crate) struct Runtime<C, E>
where
    C: Connector,
    E: Environment,
{
    env: E,
    connector: C,
    config: ChatConfig,
    connection: ConnectionManager<E::Instant>,
    reconciler: Reconciler,
    delivery: DeliveryCoordinator<E::Instant>,
    link: Option<ActiveLink>,
    waiters: HashMap<SendTicket, oneshot::Sender<Result<Delivery, DeliveryError>>>,
    state: ChatState,
    state_tx: watch::Sender<ChatState>,
    signals: broadcast::Sender<Signal>,
    commands: mpsc::Receiver<Command>,
}

impl<C, E> Runtime<C, E>
where
    C: Connector,
    E: Environment,
{
    pub(crate) fn new(
        config: ChatConfig,
        connector: C,
        env: E,
        state_tx: watch::Sender<ChatState>,
        signals: broadcast::Sender<Signal>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            env,
            connector,
            connection: ConnectionManager::new(config.connection.clone()),
            reconciler: Reconciler::new(config.reconciler.clone()),
            delivery: DeliveryCoordinator::new(config.delivery.clone()),
            config,
            link: None,
            waiters: HashMap::new(),
            state: ChatState::default(),
            state_tx,
            signals,
            commands,
        }
    }

    /// Run until shutdown or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!(url = %self.config.server_url, "chat runtime starting");
        let actions = self.connection.connect(self.env.now());
        self.apply_connection(actions);

        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll = tokio::time::interval(self.config.state_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Both intervals complete immediately once; skip that.
        tick.reset();
        poll.reset();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        self.shutdown();
                        let _ = done.send(());
                        break;
                    },
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    },
                },
                event = next_link_event(&mut self.link) => self.handle_link_event(event),
                _ = tick.tick() => self.handle_tick(),
                _ = poll.tick() => self.poll_connection(),
            }
        }

        info!("chat runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let now = self.env.now();
        match command {
            Command::Send { request, reply } => {
                let link = self.link_status();
                let Some((ticket, actions)) = self.delivery.submit(&request, link, now) else {
                    let _ = reply.send(Ok(Delivery::Skipped));
                    return;
                };

                self.waiters.insert(ticket, reply);
                self.state.loading = true;
                self.state.error = None;
                self.publish();
                self.apply_delivery(actions);
            },
            Command::Reconnect => {
                let actions = self.connection.reconnect(now, ReconnectCause::Manual);
                self.apply_connection(actions);
            },
            Command::Clear => {
                self.reconciler.clear();
                self.state.messages.clear();
                self.publish();
            },
            // Handled by the run loop
            Command::Shutdown { .. } => {},
        }
    }

    fn handle_link_event(&mut self, event: Option<LinkEvent>) {
        let Some(event) = event else {
            if let Some(active) = self.link.as_mut() {
                active.drained = true;
            }
            let actions = self.connection.handle_transport(TransportEvent::Closed {
                reason: "transport task ended".to_string(),
            });
            self.apply_connection(actions);
            return;
        };

        match event {
            LinkEvent::Opened => {
                let actions = self.connection.handle_transport(TransportEvent::Opened);
                self.apply_connection(actions);
                if self.connection.is_connected() {
                    let actions = self.delivery.link_ready(self.env.now());
                    self.apply_delivery(actions);
                }
            },
            LinkEvent::Closed { reason } => {
                let actions = self.connection.handle_transport(TransportEvent::Closed { reason });
                self.apply_connection(actions);
            },
            LinkEvent::ConnectFailed { reason } => {
                let actions =
                    self.connection.handle_transport(TransportEvent::ConnectFailed { reason });
                self.apply_connection(actions);
            },
            LinkEvent::Frame(frame) => self.handle_frame(frame),
        }
    }

    fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Message(raw) => match self.reconciler.admit(&raw, &self.env) {
                Ok(ReconcileEvent::MessageAdmitted(message)) => {
                    self.state.messages.push(message.clone());
                    self.publish();
                    let _ = self.signals.send(Signal::MessageAdmitted(message));
                },
                Ok(ReconcileEvent::SnapshotReplaced { .. }) => {},
                Err(rejection) => debug!(?rejection, "inbound message not admitted"),
            },
            ServerFrame::RecentMessages(entries) => {
                let event = self.reconciler.apply_snapshot(&entries, &self.env);
                self.state.messages = self.reconciler.messages().to_vec();
                self.publish();
                if let Some(ReconcileEvent::SnapshotReplaced { count }) = event {
                    info!(count, "recent messages loaded");
                    let _ = self.signals.send(Signal::SnapshotReplaced { count });
                }
            },
            ServerFrame::Error(payload) => {
                let text = match payload {
                    Value::String(text) if !text.trim().is_empty() => text,
                    _ => GENERIC_SERVER_ERROR.to_string(),
                };
                warn!(error = %text, "server reported error");
                // The next poll restores the flag and clears the text if the
                // transport is still up.
                self.state.connected = Some(false);
                self.state.error = Some(text);
                self.publish();
            },
            ServerFrame::Ack { id, ack } => {
                if let Some(action) = self.delivery.acknowledge(SendTicket(id), ack) {
                    self.apply_delivery(vec![action]);
                } else {
                    debug!(id, "acknowledgment for unknown or resolved send");
                }
            },
        }
    }

    fn handle_tick(&mut self) {
        let now = self.env.now();
        let transport_connected = self.transport_connected();

        let actions = self.connection.tick(now, transport_connected);
        self.apply_connection(actions);

        let actions = self.delivery.tick(now);
        self.apply_delivery(actions);
    }

    /// Re-read the connection flag from the transport in case an event was
    /// missed.
    fn poll_connection(&mut self) {
        let connected = self.transport_connected();
        if self.state.connected == Some(connected) {
            return;
        }

        debug!(connected, "connection flag corrected by poll");
        self.state.connected = Some(connected);
        if connected {
            self.state.error = None;
        }
        self.publish();
    }

    fn apply_connection(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::TearDown => {
                    if let Some(mut active) = self.link.take() {
                        active.link.close();
                    }
                },
                ConnectionAction::Open => {
                    debug!(url = %self.config.server_url, "opening transport");
                    self.link = Some(ActiveLink { link: self.connector.open(), drained: false });
                },
                ConnectionAction::Notify(event) => self.apply_lifecycle(event),
            }
        }
    }

    fn apply_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Connected => {
                self.state.connected = Some(true);
                self.state.error = None;
            },
            LifecycleEvent::Disconnected { .. } => {
                self.state.connected = Some(false);
            },
            LifecycleEvent::ConnectFailed { error, .. } | LifecycleEvent::Exhausted { error } => {
                self.state.connected = Some(false);
                // Failures the retry loop may still fix stay out of the UI.
                if !error.is_transient() {
                    self.state.error = Some(error.to_string());
                }
            },
        }
        self.publish();
    }

    fn apply_delivery(&mut self, actions: Vec<DeliveryAction>) {
        let mut queue = actions;
        while !queue.is_empty() {
            for action in std::mem::take(&mut queue) {
                match action {
                    DeliveryAction::Transmit { ticket, frame } => {
                        let sent = match &self.link {
                            Some(active) => active.link.send(frame),
                            None => Err("no transport".to_string()),
                        };
                        if let Err(reason) = sent {
                            queue.extend(self.delivery.transmit_failed(ticket, &reason));
                        }
                    },
                    DeliveryAction::Connect => {
                        let actions = self.connection.connect(self.env.now());
                        self.apply_connection(actions);
                    },
                    DeliveryAction::Reconnect
                        if self.connection.state() == ConnectionState::Connecting =>
                    {
                        debug!("send waiting on the attempt in progress");
                    },
                    DeliveryAction::Reconnect => {
                        let actions =
                            self.connection.reconnect(self.env.now(), ReconnectCause::Send);
                        self.apply_connection(actions);
                    },
                    DeliveryAction::Resolve { ticket, outcome } => self.resolve(ticket, outcome),
                }
            }
        }
    }

    fn resolve(&mut self, ticket: SendTicket, outcome: Result<Delivery, DeliveryError>) {
        if let Err(error) = &outcome {
            self.state.error = Some(error.to_string());
        }
        self.state.loading = self.delivery.outstanding() > 0;
        self.publish();

        if let Some(reply) = self.waiters.remove(&ticket) {
            // The caller may have stopped waiting.
            let _ = reply.send(outcome);
        }
    }

    fn shutdown(&mut self) {
        let actions = self.connection.disconnect();
        self.apply_connection(actions);
        let actions = self.delivery.stop();
        self.apply_delivery(actions);

        self.state.connected = Some(false);
        self.publish();
    }

    fn link_status(&self) -> LinkStatus {
        match &self.link {
            None => LinkStatus::Absent,
            Some(active) if active.link.is_connected() && self.connection.is_connected() => {
                LinkStatus::Up
            },
            Some(_) => LinkStatus::Down,
        }
    }

    fn transport_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|active| active.link.is_connected())
    }

    fn publish(&mut self) {
        self.state_tx.send_replace(self.state.clone());
        let _ = self.signals.send(Signal::StateChanged);
    }
}

/// Next event from the live link, or never if there is none.
async fn next_link_event(link: &mut Option<ActiveLink>) -> Option<LinkEvent> {
    match link {
        Some(active) if !active.drained => active.link.recv().await,
        _ => std::future::pending().await,
    }
}
