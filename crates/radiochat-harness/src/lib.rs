//! Deterministic simulation harness for radiochat testing.
//!
//! Simulated implementations of the Environment and Connector seams, so the
//! production runtime can be driven end to end under tokio's paused clock.
//!
//! # Components
//!
//! - [`SimEnv`]: seeded RNG, paused-clock instants, derived wall clock
//! - [`SimServer`] / [`SimConnector`]: in-process chat server with fault
//!   controls (refuse connections, drop clients, withhold acks)
//!
//! # Invariant Testing
//!
//! The `invariants` module verifies properties that must hold after every
//! step. Use [`InvariantRegistry::standard()`] for the message-log
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    CacheBound, ChatSnapshot, Invariant, InvariantRegistry, InvariantResult, NonBlankAuthor,
    NonBlankContent, UniqueMessageIds, Violation,
};
pub use sim_env::SimEnv;
pub use sim_server::{AckPolicy, SimConnector, SimServer};
