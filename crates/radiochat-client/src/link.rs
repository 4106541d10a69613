//! Transport link abstraction.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use radiochat_proto::{ClientFrame, ServerFrame};
use tokio::{sync::mpsc, task::AbortHandle};

/// Channel capacity for each direction of a link.
pub const LINK_CHANNEL_CAPACITY: usize = 64;

/// Events produced by a link's connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection is established.
    Opened,
    /// An established connection closed.
    Closed {
        /// Close reason.
        reason: String,
    },
    /// The connection could not be established.
    ConnectFailed {
        /// Failure reason.
        reason: String,
    },
    /// A decoded server event.
    Frame(ServerFrame),
}

/// Opens transport links.
///
/// `open` is called from within a tokio runtime. It must return immediately:
/// connecting happens on a spawned task that reports through the link's
/// event channel.
pub trait Connector: Send + Sync + 'static {
    /// Start a new connection attempt.
    fn open(&self) -> TransportLink;
}

/// Runtime side of one connection.
///
/// Dropping the link stops its connection task.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::Sender<ClientFrame>,
    events: mpsc::Receiver<LinkEvent>,
    connected: Arc<AtomicBool>,
    abort_handle: Option<AbortHandle>,
}

/// Connection-task side of one connection.
#[derive(Debug)]
pub struct LinkHandles {
    /// Frames the runtime wants sent.
    pub outbound: mpsc::Receiver<ClientFrame>,
    /// Events for the runtime.
    pub events: mpsc::Sender<LinkEvent>,
    connected: Arc<AtomicBool>,
}

impl TransportLink {
    /// Create a link and the handles its connection task drives.
    pub fn pair() -> (Self, LinkHandles) {
        let (outbound_tx, outbound_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let link = Self {
            outbound: outbound_tx,
            events: events_rx,
            connected: connected.clone(),
            abort_handle: None,
        };
        let handles = LinkHandles { outbound: outbound_rx, events: events_tx, connected };
        (link, handles)
    }

    /// Tie the connection task's lifetime to this link.
    pub fn attach(&mut self, abort_handle: AbortHandle) {
        self.abort_handle = Some(abort_handle);
    }

    /// The connection task's own report of liveness.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue a frame for sending without waiting.
    pub fn send(&self, frame: ClientFrame) -> Result<(), String> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => "outbound queue full".to_string(),
            mpsc::error::TrySendError::Closed(_) => "connection closed".to_string(),
        })
    }

    /// Next event from the connection task. `None` once the task is gone.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }

    /// Stop the connection task.
    pub fn close(&mut self) {
        self.connected.store(false, Ordering::Release);
        if let Some(handle) = self.abort_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.close();
    }
}

impl LinkHandles {
    /// Update the liveness flag read by [`TransportLink::is_connected`].
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Deliver an event. Returns `false` if the runtime dropped the link.
    pub async fn emit(&self, event: LinkEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}
