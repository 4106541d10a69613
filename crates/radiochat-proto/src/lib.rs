//! Wire protocol for the radiochat namespace.
//!
//! Every WebSocket text frame carries exactly one JSON envelope. Inbound
//! envelopes ([`ServerFrame`]) are decoded leniently: the envelope itself must
//! be well formed, but message payloads stay loosely typed ([`RawMessage`])
//! until the core crate validates and normalizes them. Outbound envelopes
//! ([`ClientFrame`]) are strictly typed.
//!
//! # Envelopes
//!
//! ```text
//! server -> client   {"event":"message","data":{...}}
//!                    {"event":"recent-messages","data":[{...}, ...]}
//!                    {"event":"error","data":...}
//!                    {"event":"ack","id":7,"data":{"success":true}}
//! client -> server   {"event":"message","id":7,"data":{"user":{...},"content":"..."}}
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod payloads;

pub use envelope::{ClientFrame, ServerFrame};
pub use errors::{ProtoError, Result};
pub use payloads::{AckPayload, OutgoingMessage, RawMessage, RawUser, UserInfo};
