//! Wire protocol handling for the chat platform connection.
//!
//! The platform speaks a OneBot-style JSON protocol over a persistent
//! WebSocket: inbound frames are events discriminated by `post_type`,
//! outbound frames are `{action, params, echo?}` envelopes.

pub mod action;
pub mod client;
pub mod event;

pub use action::{ActionSender, OutboundAction};
pub use client::ProtocolClient;
pub use event::{MessageEvent, ProtocolEvent};

/// Reserved echo value marking our own liveness probe and its ack.
pub const HEARTBEAT_ECHO: &str = "heartbeat";
