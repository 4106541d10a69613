//! Transport links for the radiochat core.
//!
//! The core state machines never touch a socket. This crate provides the
//! seam between them and the network: a [`Connector`] opens a
//! [`TransportLink`], a pair of channels plus a liveness flag backed by a
//! spawned connection task. The runtime reads [`LinkEvent`]s from the link
//! and writes [`ClientFrame`](radiochat_proto::ClientFrame)s to it.
//!
//! # Components
//!
//! - [`Connector`]: opens links; implemented by the WebSocket transport and by
//!   the simulation harness
//! - [`TransportLink`]: handle to one connection attempt and its lifetime
//! - [`SystemEnv`]: production [`Environment`]
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::WebSocketConnector`]: WebSocket connector

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod link;
mod system_env;

#[cfg(feature = "transport")]
pub mod transport;

pub use link::{Connector, LinkEvent, LinkHandles, TransportLink};
pub use radiochat_core::env::Environment;
pub use system_env::SystemEnv;
#[cfg(feature = "transport")]
pub use transport::{TransportError, WebSocketConnector};
