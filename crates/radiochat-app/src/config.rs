//! Facade configuration.

use std::time::Duration;

use radiochat_core::{ConnectionConfig, DeliveryConfig, ReconcilerConfig};

/// Default chat namespace URL.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3000/chat";

/// Interval at which the connection flag is re-read from the transport.
pub const DEFAULT_STATE_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Resolution of the runtime's deadline checks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of the signal broadcast channel.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 256;

/// Chat service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Chat namespace URL
    pub server_url: String,
    /// Connection lifecycle and retry policy
    pub connection: ConnectionConfig,
    /// Send wait windows
    pub delivery: DeliveryConfig,
    /// Identity cache size and fallback author
    pub reconciler: ReconcilerConfig,
    /// Connection flag poll interval
    pub state_poll_interval: Duration,
    /// Deadline check interval
    pub tick_interval: Duration,
    /// Signals buffered per subscriber before it lags
    pub signal_capacity: usize,
}

impl ChatConfig {
    /// Defaults with a different server URL.
    pub fn with_server_url(url: impl Into<String>) -> Self {
        Self { server_url: url.into(), ..Self::default() }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connection: ConnectionConfig::default(),
            delivery: DeliveryConfig::default(),
            reconciler: ReconcilerConfig::default(),
            state_poll_interval: DEFAULT_STATE_POLL_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}
