//! Service construction and the handle UIs hold.

use radiochat_client::Connector;
use radiochat_core::{Delivery, DeliveryError, Environment, SendRequest};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{
    ChatConfig, ChatState, Signal, Subscription,
    runtime::{Command, Runtime},
};

const COMMAND_CAPACITY: usize = 64;

/// Chat service, constructed explicitly and started once.
pub struct ChatService<C, E>
where
    C: Connector,
    E: Environment,
{
    config: ChatConfig,
    connector: C,
    env: E,
}

impl<C, E> ChatService<C, E>
where
    C: Connector,
    E: Environment,
{
    /// Create a service. Nothing runs until [`ChatService::start`].
    pub fn new(config: ChatConfig, connector: C, env: E) -> Self {
        Self { config, connector, env }
    }

    /// Spawn the runtime task and connect.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> ChatHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChatState::default());
        let (signals_tx, _) = broadcast::channel(self.config.signal_capacity.max(1));

        let runtime = Runtime::new(
            self.config,
            self.connector,
            self.env,
            state_tx,
            signals_tx.clone(),
            commands_rx,
        );
        tokio::spawn(runtime.run());

        ChatHandle { commands: commands_tx, state: state_rx, signals: signals_tx }
    }
}

/// Cloneable handle to a running chat service.
///
/// The service stops on [`ChatHandle::shutdown`] or once every handle is
/// dropped.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ChatState>,
    signals: broadcast::Sender<Signal>,
}

impl ChatHandle {
    /// Send a message and wait for its outcome.
    ///
    /// Returns [`Delivery::Skipped`] without contacting the server when the
    /// content or author is blank. A send never appends to the log itself;
    /// the message appears when the server echoes it.
    pub async fn send(&self, request: SendRequest) -> Result<Delivery, DeliveryError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Send { request, reply })
            .await
            .map_err(|_| DeliveryError::Stopped)?;
        outcome.await.unwrap_or(Err(DeliveryError::Stopped))
    }

    /// Reconnect now, resetting the failure counter.
    pub async fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect).await;
    }

    /// Empty the local log and identity cache. The server is unaffected.
    pub async fn clear(&self) {
        let _ = self.commands.send(Command::Clear).await;
    }

    /// Disconnect and stop the service. Pending sends fail with
    /// [`DeliveryError::Stopped`].
    pub async fn shutdown(&self) {
        let (done, stopped) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).await.is_ok() {
            let _ = stopped.await;
        }
    }

    /// Current state.
    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ChatState> {
        self.state.clone()
    }

    /// Subscribe to signals published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.signals.subscribe())
    }

    /// Whether the runtime task is still running.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
