//! In-process chat server for simulation.
//!
//! `SimServer` plays the backend's part of the wire protocol: it sends the
//! recent-history snapshot on connect, acknowledges outbound messages
//! according to an [`AckPolicy`], and re-broadcasts accepted messages to every
//! connected client. Tests reach in to inject faults: refuse connections,
//! drop clients with or without a close event, or push arbitrary events.
//!
//! [`SimConnector`] implements the production [`Connector`] seam, so the
//! runtime under test is the same code that runs against a real socket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use radiochat_client::{Connector, LinkEvent, LinkHandles, TransportLink};
use radiochat_proto::{AckPayload, ClientFrame, OutgoingMessage, RawMessage, ServerFrame};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// How the server answers outbound messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckPolicy {
    /// `{"success": true}`
    Accept,
    /// `{"success": false, "error": reason}`
    Reject(Option<String>),
    /// Acknowledge with no body.
    Empty,
    /// Never acknowledge.
    Silent,
}

/// Instructions from the server to one client connection task.
#[derive(Debug)]
enum Push {
    Frame(ServerFrame),
    /// Close the connection and report it.
    Drop { reason: String },
    /// Stop delivering without reporting anything.
    Vanish,
}

struct ClientConn {
    id: u64,
    pushes: mpsc::UnboundedSender<Push>,
}

struct Inner {
    reachable: bool,
    echo: bool,
    ack_policy: AckPolicy,
    history: Vec<RawMessage>,
    received: Vec<OutgoingMessage>,
    clients: Vec<ClientConn>,
    connection_attempts: u32,
    next_client_id: u64,
    next_message_id: u64,
}

/// Simulated chat server. Clones share state.
#[derive(Clone)]
pub struct SimServer {
    inner: Arc<Mutex<Inner>>,
}

impl Default for SimServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimServer {
    /// Reachable server that echoes messages and accepts everything.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                reachable: true,
                echo: true,
                ack_policy: AckPolicy::Accept,
                history: Vec::new(),
                received: Vec::new(),
                clients: Vec::new(),
                connection_attempts: 0,
                next_client_id: 1,
                next_message_id: 1,
            })),
        }
    }

    /// Connector that opens links to this server.
    pub fn connector(&self) -> SimConnector {
        SimConnector { server: self.clone() }
    }

    /// Refuse (`false`) or accept (`true`) new connections.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Choose how outbound messages are acknowledged.
    pub fn set_ack_policy(&self, policy: AckPolicy) {
        self.lock().ack_policy = policy;
    }

    /// Whether received messages are re-broadcast.
    pub fn set_echo(&self, echo: bool) {
        self.lock().echo = echo;
    }

    /// Replace the history sent as a snapshot on connect.
    pub fn set_history(&self, history: Vec<RawMessage>) {
        self.lock().history = history;
    }

    /// Broadcast a message event to every client without recording it.
    pub fn push_message(&self, message: RawMessage) {
        self.broadcast(|| Push::Frame(ServerFrame::Message(message.clone())));
    }

    /// Broadcast a recent-messages snapshot to every client.
    pub fn push_snapshot(&self, entries: Vec<RawMessage>) {
        self.broadcast(|| Push::Frame(ServerFrame::RecentMessages(entries.clone())));
    }

    /// Broadcast an error event.
    pub fn push_error(&self, payload: Value) {
        self.broadcast(|| Push::Frame(ServerFrame::Error(payload.clone())));
    }

    /// Acknowledge message `id` on every client, regardless of policy.
    pub fn push_ack(&self, id: u64, ack: Option<AckPayload>) {
        self.broadcast(|| Push::Frame(ServerFrame::Ack { id, ack: ack.clone() }));
    }

    /// Close every connection with a reported close event.
    pub fn drop_clients(&self, reason: &str) {
        let clients = std::mem::take(&mut self.lock().clients);
        for client in clients {
            let _ = client.pushes.send(Push::Drop { reason: reason.to_string() });
        }
    }

    /// Lose every connection without any close event reaching the client.
    pub fn vanish_clients(&self) {
        let clients = std::mem::take(&mut self.lock().clients);
        for client in clients {
            let _ = client.pushes.send(Push::Vanish);
        }
    }

    /// Messages received from clients, in arrival order.
    pub fn received(&self) -> Vec<OutgoingMessage> {
        self.lock().received.clone()
    }

    /// Connection attempts so far, refused ones included.
    pub fn connection_attempts(&self) -> u32 {
        self.lock().connection_attempts
    }

    /// Currently connected clients.
    pub fn connected_clients(&self) -> usize {
        self.lock().clients.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, push: impl Fn() -> Push) {
        let mut inner = self.lock();
        inner.clients.retain(|client| client.pushes.send(push()).is_ok());
    }

    /// Register a new connection, or `None` if refused.
    fn accept(&self) -> Option<(u64, mpsc::UnboundedReceiver<Push>)> {
        let mut inner = self.lock();
        inner.connection_attempts += 1;
        if !inner.reachable {
            debug!(attempt = inner.connection_attempts, "sim server refused connection");
            return None;
        }

        let id = inner.next_client_id;
        inner.next_client_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Push::Frame(ServerFrame::RecentMessages(inner.history.clone())));
        inner.clients.push(ClientConn { id, pushes: tx });
        Some((id, rx))
    }

    fn detach(&self, client_id: u64) {
        self.lock().clients.retain(|client| client.id != client_id);
    }

    fn receive(&self, client_id: u64, frame: ClientFrame) {
        let ClientFrame::Message { id, message } = frame;
        let mut inner = self.lock();
        inner.received.push(message.clone());

        let ack = match &inner.ack_policy {
            AckPolicy::Accept => Some(Some(AckPayload::accepted())),
            AckPolicy::Reject(reason) => Some(Some(AckPayload::rejected(reason.as_deref()))),
            AckPolicy::Empty => Some(None),
            AckPolicy::Silent => None,
        };
        let accepted = matches!(inner.ack_policy, AckPolicy::Accept | AckPolicy::Empty | AckPolicy::Silent);

        if inner.echo && accepted {
            let echo = RawMessage::new(message.content)
                .with_id(format!("srv-{}", inner.next_message_id))
                .with_user(message.user.name, message.user.avatar.as_deref());
            inner.next_message_id += 1;
            inner.history.push(echo.clone());
            inner.clients.retain(|client| {
                client.pushes.send(Push::Frame(ServerFrame::Message(echo.clone()))).is_ok()
            });
        }

        if let Some(ack) = ack
            && let Some(client) = inner.clients.iter().find(|client| client.id == client_id)
        {
            let _ = client.pushes.send(Push::Frame(ServerFrame::Ack { id, ack }));
        }
    }
}

/// Opens links to a [`SimServer`].
#[derive(Clone)]
pub struct SimConnector {
    server: SimServer,
}

impl Connector for SimConnector {
    fn open(&self) -> TransportLink {
        let (mut link, handles) = TransportLink::pair();
        let task = tokio::spawn(serve(self.server.clone(), handles));
        link.attach(task.abort_handle());
        link
    }
}

/// Connection task: bridges one link to the server.
async fn serve(server: SimServer, mut handles: LinkHandles) {
    // Let the runtime finish its current step before the outcome arrives.
    tokio::task::yield_now().await;

    let Some((client_id, mut pushes)) = server.accept() else {
        handles.emit(LinkEvent::ConnectFailed { reason: "connection refused".to_string() }).await;
        return;
    };

    handles.set_connected(true);
    if !handles.emit(LinkEvent::Opened).await {
        server.detach(client_id);
        return;
    }

    loop {
        tokio::select! {
            outbound = handles.outbound.recv() => match outbound {
                Some(frame) => server.receive(client_id, frame),
                None => break,
            },
            push = pushes.recv() => match push {
                Some(Push::Frame(frame)) => {
                    if !handles.emit(LinkEvent::Frame(frame)).await {
                        break;
                    }
                },
                Some(Push::Drop { reason }) => {
                    handles.set_connected(false);
                    handles.emit(LinkEvent::Closed { reason }).await;
                    break;
                },
                Some(Push::Vanish) | None => {
                    handles.set_connected(false);
                    // Stay silent until the runtime tears this link down.
                    while handles.outbound.recv().await.is_some() {}
                    break;
                },
            },
        }
    }

    server.detach(client_id);
}
