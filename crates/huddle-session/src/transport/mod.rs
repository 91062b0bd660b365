//! The signaling relay capability.
//!
//! A transport registers an identity with the relay, opens data connections
//! and media calls to other participants, and reports what happens to them
//! on three event channels: one for the relay itself, one for connections
//! and one for calls. The session coordinator selects over those channels.

mod events;
pub mod memory;
pub mod ws;

use async_trait::async_trait;

use huddle_common::{SessionError, StreamDescriptor};

pub use events::{
    event_channels, CallEvent, CallId, ConnectionEvent, ConnectionId, EventSinks, RelayEvent,
    TransportEvents,
};
pub use memory::{MemoryRelay, MemoryTransport};
pub use ws::{WsConfig, WsTransport};

#[async_trait]
pub trait SignalingTransport: Send {
    /// Claim `desired_id`, or take a relay-assigned id when `None`.
    ///
    /// Fails with `RoomIdConflict` when the id is already claimed.
    async fn register(&mut self, desired_id: Option<&str>) -> Result<String, SessionError>;

    /// Open a data connection to `peer_id`. `ConnectionEvent::Open` follows
    /// once the remote side accepts.
    async fn connect(&mut self, peer_id: &str) -> Result<ConnectionId, SessionError>;

    async fn send(&mut self, conn: ConnectionId, data: String) -> Result<(), SessionError>;

    async fn close_connection(&mut self, conn: ConnectionId);

    /// Call `peer_id` offering `stream`. `CallEvent::Stream` follows once the
    /// callee answers.
    async fn call(
        &mut self,
        peer_id: &str,
        stream: StreamDescriptor,
    ) -> Result<CallId, SessionError>;

    /// Answer an inbound call with our stream.
    async fn answer(&mut self, call: CallId, stream: StreamDescriptor)
        -> Result<(), SessionError>;

    async fn hang_up(&mut self, call: CallId);

    /// Release the relay identity and every connection and call.
    async fn destroy(&mut self);
}
