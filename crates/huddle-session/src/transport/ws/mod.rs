//! WebSocket transport against a `huddle-relay` server.
//!
//! A writer task owns the socket sink and drains an outbound frame queue; a
//! reader task turns relay frames into transport events. Local connection
//! and call handles are mapped to wire ids in a shared link table.

mod client;
mod links;
mod reader;

pub use client::{WsConfig, WsTransport};
