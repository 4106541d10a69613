//! Synchronization facade for the radiochat client.
//!
//! The only surface a UI depends on. A single runtime task owns the
//! connection manager, reconciler and delivery coordinator, and is the only
//! writer of the observable [`ChatState`]. Handles talk to it over a command
//! channel, so every mutation happens on one timeline.
//!
//! # Components
//!
//! - [`ChatService`]: explicit construction from config, connector and
//!   environment
//! - [`ChatHandle`]: cloneable handle for `send`, `reconnect`, `clear`,
//!   `shutdown` and observation
//! - [`ChatState`]: messages, connection flag, loading flag, last error
//! - [`Signal`] / [`Subscription`]: typed notifications, detached on drop
//! - [`Profile`]: saved display name and avatar color

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod handle;
mod profile;
mod runtime;
mod signal;
mod state;

pub use config::{ChatConfig, DEFAULT_SERVER_URL, DEFAULT_STATE_POLL_INTERVAL, DEFAULT_TICK_INTERVAL};
pub use handle::{ChatHandle, ChatService};
pub use profile::{
    AVATAR_PALETTE, MemoryProfileStore, Profile, ProfileError, ProfileStore, USER_COLOR_KEY,
    USER_NAME_KEY,
};
pub use radiochat_core::{Delivery, DeliveryError, Message, SendRequest};
pub use signal::{Signal, Subscription};
pub use state::ChatState;
