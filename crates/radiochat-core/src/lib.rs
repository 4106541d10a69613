//! Chat synchronization core.
//!
//! Pure state machines for the realtime chat client. Nothing in this crate
//! performs I/O: time and randomness come from an [`env::Environment`], inputs
//! are fed in as method calls, and side effects come back as action values for
//! a runtime to execute. The same code therefore runs under the tokio runtime
//! and under a paused simulation clock.
//!
//! # Components
//!
//! - [`ConnectionManager`]: transport lifecycle, attempt budget, health probing
//! - [`Reconciler`]: deduplicated, admission-ordered message log
//! - [`IdentityCache`]: bounded FIFO set of admitted ids
//! - [`DeliveryCoordinator`]: send intents resolved by ack or deadline

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod delivery;
pub mod env;
pub mod error;
pub mod identity_cache;
pub mod message;
pub mod reconciler;

pub use connection::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, LifecycleEvent,
    ReconnectCause, TransportEvent,
};
pub use delivery::{
    Delivery, DeliveryAction, DeliveryConfig, DeliveryCoordinator, LinkStatus, SendRequest,
    SendTicket,
};
pub use env::Environment;
pub use error::{ConnectionError, DeliveryError};
pub use identity_cache::IdentityCache;
pub use message::{Author, Message, MessageId};
pub use reconciler::{ReconcileEvent, Reconciler, ReconcilerConfig, Rejection};
