//! Event types and channels shared by all transports.

use tokio::sync::mpsc;
use tracing::debug;

use huddle_common::StreamDescriptor;

/// Local handle for a data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Local handle for a media call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Relay-level events.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A remote participant opened a connection to us.
    Connection { conn: ConnectionId, peer_id: String },
    /// A remote participant is calling us.
    Call {
        call: CallId,
        peer_id: String,
        stream: StreamDescriptor,
    },
    /// A connect or signal target is not registered on the relay.
    PeerUnavailable { peer_id: String },
    Disconnected,
    Closed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Open { conn: ConnectionId },
    Data { conn: ConnectionId, data: String },
    Error { conn: ConnectionId, message: String },
    Closed { conn: ConnectionId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// The remote stream is available.
    Stream {
        call: CallId,
        stream: StreamDescriptor,
    },
    Error { call: CallId, message: String },
    Closed { call: CallId },
}

/// Receiving ends handed to the session coordinator.
pub struct TransportEvents {
    pub relay: mpsc::Receiver<RelayEvent>,
    pub connections: mpsc::Receiver<ConnectionEvent>,
    pub calls: mpsc::Receiver<CallEvent>,
}

/// Sending ends kept by a transport.
#[derive(Clone)]
pub struct EventSinks {
    relay: mpsc::Sender<RelayEvent>,
    connections: mpsc::Sender<ConnectionEvent>,
    calls: mpsc::Sender<CallEvent>,
}

impl EventSinks {
    pub async fn relay(&self, event: RelayEvent) {
        if self.relay.send(event).await.is_err() {
            debug!("relay event dropped, session gone");
        }
    }

    pub async fn connection(&self, event: ConnectionEvent) {
        if self.connections.send(event).await.is_err() {
            debug!("connection event dropped, session gone");
        }
    }

    pub async fn call(&self, event: CallEvent) {
        if self.calls.send(event).await.is_err() {
            debug!("call event dropped, session gone");
        }
    }
}

/// Create the three event channels, each with `capacity` slots.
pub fn event_channels(capacity: usize) -> (EventSinks, TransportEvents) {
    let (relay_tx, relay_rx) = mpsc::channel(capacity);
    let (conn_tx, conn_rx) = mpsc::channel(capacity);
    let (call_tx, call_rx) = mpsc::channel(capacity);
    (
        EventSinks {
            relay: relay_tx,
            connections: conn_tx,
            calls: call_tx,
        },
        TransportEvents {
            relay: relay_rx,
            connections: conn_rx,
            calls: call_rx,
        },
    )
}
