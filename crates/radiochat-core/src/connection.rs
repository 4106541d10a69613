//! Connection manager state machine.
//!
//! Supervises exactly one logical connection to the chat server: opening and
//! tearing down the transport, counting consecutive failures against an
//! attempt budget, and probing liveness on a fixed interval. Uses the action
//! pattern: methods take time as input and return actions for the driver to
//! execute. No I/O happens here.
//!
//! # State Machine
//!
//! ```text
//!                 connect / reconnect
//! ┌──────────────┐ ─────────────────> ┌────────────┐   Opened   ┌───────────┐
//! │ Disconnected │                    │ Connecting │──────────> │ Connected │
//! └──────────────┘ <───────┐          └────────────┘            └───────────┘
//!        ^                 │            │      ^                      │
//!        │                 │  failed /  │      │ health check         │
//!        │                 │  timeout   v      │ (budget left)        │
//!        │                 │          ┌─────────┐                     │
//!        │                 └──────────│ Errored │                     │
//!        │                            └─────────┘                     │
//!        └────────────────── Closed / probe finds link dead ──────────┘
//! ```

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use tracing::{error, info, warn};

use crate::error::ConnectionError;

/// Consecutive failed attempts after which automatic reconnection stops.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Interval between liveness probes.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(5);

/// Time allowed for a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Actions returned by the connection manager.
///
/// The driver executes these in order:
/// - `TearDown`: close and drop the current transport
/// - `Open`: create a new transport and start connecting
/// - `Notify`: publish a lifecycle event to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Create a transport and begin connecting.
    Open,
    /// Close and drop the existing transport.
    TearDown,
    /// Publish a lifecycle event.
    Notify(LifecycleEvent),
}

/// Lifecycle notifications for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The transport is connected.
    Connected,
    /// A connected transport went away.
    Disconnected {
        /// Human-readable cause.
        reason: String,
    },
    /// A connection attempt failed.
    ConnectFailed {
        /// Consecutive failure count including this one.
        attempt: u32,
        /// Failure cause.
        error: ConnectionError,
    },
    /// The attempt budget ran out; automatic reconnection has stopped.
    Exhausted {
        /// Always [`ConnectionError::Exhausted`].
        error: ConnectionError,
    },
}

/// Events reported by the transport link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport finished connecting.
    Opened,
    /// The transport closed.
    Closed {
        /// Close reason.
        reason: String,
    },
    /// The transport could not connect.
    ConnectFailed {
        /// Failure reason.
        reason: String,
    },
}

/// Why a reconnect was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectCause {
    /// Explicit user action. Resets the failure counter.
    Manual,
    /// Periodic liveness probe. Subject to the attempt budget.
    HealthCheck,
    /// A send found the transport down.
    Send,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in progress
    Disconnected,
    /// Attempt in progress
    Connecting,
    /// Transport connected
    Connected,
    /// Last attempt failed
    Errored,
}

/// Connection manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Consecutive failures before automatic attempts stop
    pub max_attempts: u32,
    /// Interval between liveness probes
    pub liveness_interval: Duration,
    /// Timeout for a single connection attempt
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Connection manager state machine
///
/// Pure state machine: the driver owns the transport and feeds its events in
/// through [`ConnectionManager::handle_transport`]. At most one transport is
/// live at a time because every `Open` is preceded by a `TearDown` when one
/// already exists.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    config: ConnectionConfig,
    /// Whether the driver currently holds a transport (connected or not)
    has_transport: bool,
    failed_attempts: u32,
    /// Start of the outstanding attempt, while `Connecting`
    attempt_started: Option<I>,
    last_probe: Option<I>,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a manager in [`ConnectionState::Disconnected`] with no transport.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            has_transport: false,
            failed_attempts: 0,
            attempt_started: None,
            last_probe: None,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the transport is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether a transport exists, connected or not.
    #[must_use]
    pub fn has_transport(&self) -> bool {
        self.has_transport
    }

    /// Consecutive failed attempts since the last success or manual reconnect.
    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Whether automatic reconnection has stopped.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.failed_attempts >= self.config.max_attempts
    }

    /// Open a transport, tearing down any existing one first.
    pub fn connect(&mut self, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::with_capacity(2);
        if self.has_transport {
            actions.push(ConnectionAction::TearDown);
        }
        actions.push(ConnectionAction::Open);

        self.has_transport = true;
        self.state = ConnectionState::Connecting;
        self.attempt_started = Some(now);

        actions
    }

    /// Force a fresh connection attempt.
    ///
    /// `Manual` resets the failure counter and always proceeds. `Send` always
    /// proceeds. `HealthCheck` does nothing once the budget is exhausted.
    pub fn reconnect(&mut self, now: I, cause: ReconnectCause) -> Vec<ConnectionAction> {
        match cause {
            ReconnectCause::Manual => {
                info!(failed_attempts = self.failed_attempts, "manual reconnect");
                self.failed_attempts = 0;
            },
            ReconnectCause::HealthCheck if self.budget_exhausted() => return Vec::new(),
            ReconnectCause::HealthCheck | ReconnectCause::Send => {},
        }

        self.connect(now)
    }

    /// Drop the transport for good (service shutdown).
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let actions =
            if self.has_transport { vec![ConnectionAction::TearDown] } else { Vec::new() };

        self.has_transport = false;
        self.state = ConnectionState::Disconnected;
        self.attempt_started = None;

        actions
    }

    /// Process an event reported by the current transport.
    pub fn handle_transport(&mut self, event: TransportEvent) -> Vec<ConnectionAction> {
        match (self.state, event) {
            (ConnectionState::Connected, TransportEvent::Opened) => Vec::new(),

            (_, TransportEvent::Opened) => {
                info!(previous_failures = self.failed_attempts, "connected to chat server");
                self.state = ConnectionState::Connected;
                self.failed_attempts = 0;
                self.attempt_started = None;
                vec![ConnectionAction::Notify(LifecycleEvent::Connected)]
            },

            (ConnectionState::Connected, TransportEvent::Closed { reason }) => {
                warn!(%reason, "disconnected from chat server");
                self.state = ConnectionState::Disconnected;
                vec![ConnectionAction::Notify(LifecycleEvent::Disconnected { reason })]
            },

            (ConnectionState::Connecting, TransportEvent::Closed { reason }) => {
                self.record_failure(ConnectionError::Closed(reason))
            },

            (ConnectionState::Connecting, TransportEvent::ConnectFailed { reason }) => {
                self.record_failure(ConnectionError::ConnectFailed(reason))
            },

            // Late events for an attempt that already resolved
            (_, TransportEvent::Closed { .. } | TransportEvent::ConnectFailed { .. }) => Vec::new(),
        }
    }

    /// Process periodic maintenance (attempt timeout and liveness probe).
    ///
    /// `transport_connected` is the transport's own report of whether it is
    /// connected, which can disagree with [`ConnectionManager::state`] when a
    /// disconnect went unreported.
    pub fn tick(&mut self, now: I, transport_connected: bool) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        let overdue = match (self.state, self.attempt_started) {
            (ConnectionState::Connecting, Some(started)) => {
                Some(now - started).filter(|elapsed| *elapsed > self.config.connect_timeout)
            },
            _ => None,
        };
        if let Some(elapsed) = overdue {
            actions.extend(self.record_failure(ConnectionError::Timeout { elapsed }));
        }

        let probe_due =
            self.last_probe.is_none_or(|last| now - last >= self.config.liveness_interval);
        if !probe_due {
            return actions;
        }
        self.last_probe = Some(now);

        if self.state == ConnectionState::Connected && !transport_connected {
            let reason = "transport reported not connected".to_string();
            warn!(%reason, "liveness probe failed");
            self.state = ConnectionState::Disconnected;
            actions.push(ConnectionAction::Notify(LifecycleEvent::Disconnected { reason }));
        }

        if self.has_transport
            && !transport_connected
            && self.state != ConnectionState::Connecting
            && !self.budget_exhausted()
        {
            actions.extend(self.reconnect(now, ReconnectCause::HealthCheck));
        }

        actions
    }

    fn record_failure(&mut self, error: ConnectionError) -> Vec<ConnectionAction> {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.state = ConnectionState::Errored;
        self.attempt_started = None;

        warn!(attempt = self.failed_attempts, %error, "connection attempt failed");
        let mut actions = vec![ConnectionAction::Notify(LifecycleEvent::ConnectFailed {
            attempt: self.failed_attempts,
            error,
        })];

        if self.failed_attempts == self.config.max_attempts {
            let error = ConnectionError::Exhausted { attempts: self.failed_attempts };
            error!(%error, "giving up automatic reconnection");
            actions.push(ConnectionAction::Notify(LifecycleEvent::Exhausted { error }));
        }

        actions
    }
}
