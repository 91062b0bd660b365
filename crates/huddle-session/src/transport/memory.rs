//! In-process relay hub.
//!
//! Every participant gets a `MemoryTransport` endpoint on a shared
//! `MemoryRelay`. The hub assigns ids, pairs connection and call handles,
//! and delivers events straight into each endpoint's channels. Used by tests
//! and single-process demos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use huddle_common::{new_id, SessionError, StreamDescriptor};

use super::events::{
    event_channels, CallEvent, CallId, ConnectionEvent, ConnectionId, EventSinks, RelayEvent,
    TransportEvents,
};
use super::SignalingTransport;

// ---------------------------------------------------------------------------
// Hub state
// ---------------------------------------------------------------------------

struct ConnLink {
    owner: String,
    peer: String,
    remote: ConnectionId,
}

struct CallLink {
    owner: String,
    peer: String,
    remote: CallId,
    /// Stream offered by the caller, kept on the callee's side until answered.
    offered: Option<StreamDescriptor>,
}

enum Outbound {
    Relay(RelayEvent),
    Connection(ConnectionEvent),
    Call(CallEvent),
}

struct Delivery {
    to: EventSinks,
    event: Outbound,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    peers: HashMap<String, EventSinks>,
    connections: HashMap<ConnectionId, ConnLink>,
    calls: HashMap<CallId, CallLink>,
}

impl HubState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Drop `id` and every link touching it. Returns close notifications for
    /// the other ends.
    fn release(&mut self, id: &str) -> Vec<Delivery> {
        self.peers.remove(id);
        let mut deliveries = Vec::new();

        let conns: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, l)| l.owner == id || l.peer == id)
            .map(|(c, _)| *c)
            .collect();
        for conn in conns {
            if let Some(link) = self.connections.remove(&conn) {
                if link.owner != id {
                    if let Some(sinks) = self.peers.get(&link.owner) {
                        deliveries.push(Delivery {
                            to: sinks.clone(),
                            event: Outbound::Connection(ConnectionEvent::Closed { conn }),
                        });
                    }
                }
            }
        }

        let calls: Vec<CallId> = self
            .calls
            .iter()
            .filter(|(_, l)| l.owner == id || l.peer == id)
            .map(|(c, _)| *c)
            .collect();
        for call in calls {
            if let Some(link) = self.calls.remove(&call) {
                if link.owner != id {
                    if let Some(sinks) = self.peers.get(&link.owner) {
                        deliveries.push(Delivery {
                            to: sinks.clone(),
                            event: Outbound::Call(CallEvent::Closed { call }),
                        });
                    }
                }
            }
        }

        deliveries
    }
}

async fn deliver(deliveries: Vec<Delivery>) {
    for Delivery { to, event } in deliveries {
        match event {
            Outbound::Relay(e) => to.relay(e).await,
            Outbound::Connection(e) => to.connection(e).await,
            Outbound::Call(e) => to.call(e).await,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryRelay
// ---------------------------------------------------------------------------

/// Shared in-process relay. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    state: Arc<RwLock<HubState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, unregistered endpoint on this relay.
    pub fn endpoint(&self, capacity: usize) -> (MemoryTransport, TransportEvents) {
        let (sinks, events) = event_channels(capacity);
        let transport = MemoryTransport {
            hub: self.clone(),
            sinks,
            id: None,
        };
        (transport, events)
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.state.read().await.peers.contains_key(id)
    }

    pub async fn peer_count(&self) -> usize {
        self.state.read().await.peers.len()
    }

    /// Number of live call handles, counting both ends of each call.
    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls.len()
    }

    /// Drop `id` from the relay as if its signaling link failed.
    pub async fn disconnect(&self, id: &str) {
        let mut state = self.state.write().await;
        let Some(sinks) = state.peers.get(id).cloned() else {
            return;
        };
        let mut deliveries = state.release(id);
        drop(state);

        deliveries.push(Delivery {
            to: sinks.clone(),
            event: Outbound::Relay(RelayEvent::Disconnected),
        });
        deliveries.push(Delivery {
            to: sinks,
            event: Outbound::Relay(RelayEvent::Closed),
        });
        info!(peer_id = id, "memory relay dropped peer");
        deliver(deliveries).await;
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// One participant's endpoint on a [`MemoryRelay`].
pub struct MemoryTransport {
    hub: MemoryRelay,
    sinks: EventSinks,
    id: Option<String>,
}

impl MemoryTransport {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn registered_id(&self) -> Result<String, SessionError> {
        self.id
            .clone()
            .ok_or_else(|| SessionError::Signaling("not registered with the relay".into()))
    }
}

#[async_trait]
impl SignalingTransport for MemoryTransport {
    async fn register(&mut self, desired_id: Option<&str>) -> Result<String, SessionError> {
        if let Some(id) = &self.id {
            return Err(SessionError::Signaling(format!("already registered as {id}")));
        }

        let mut state = self.hub.state.write().await;
        let id = match desired_id {
            Some(id) if state.peers.contains_key(id) => {
                return Err(SessionError::RoomIdConflict(id.to_string()));
            }
            Some(id) => id.to_string(),
            None => new_id(),
        };
        state.peers.insert(id.clone(), self.sinks.clone());
        drop(state);

        info!(peer_id = %id, "registered on memory relay");
        self.id = Some(id.clone());
        Ok(id)
    }

    async fn connect(&mut self, peer_id: &str) -> Result<ConnectionId, SessionError> {
        let me = self.registered_id()?;
        let mut state = self.hub.state.write().await;
        let local = ConnectionId(state.next());
        let mut deliveries = Vec::new();

        match state.peers.get(peer_id).cloned() {
            Some(remote_sinks) if peer_id != me => {
                let remote = ConnectionId(state.next());
                state.connections.insert(
                    local,
                    ConnLink {
                        owner: me.clone(),
                        peer: peer_id.to_string(),
                        remote,
                    },
                );
                state.connections.insert(
                    remote,
                    ConnLink {
                        owner: peer_id.to_string(),
                        peer: me.clone(),
                        remote: local,
                    },
                );
                deliveries.push(Delivery {
                    to: remote_sinks.clone(),
                    event: Outbound::Relay(RelayEvent::Connection {
                        conn: remote,
                        peer_id: me,
                    }),
                });
                deliveries.push(Delivery {
                    to: remote_sinks,
                    event: Outbound::Connection(ConnectionEvent::Open { conn: remote }),
                });
                deliveries.push(Delivery {
                    to: self.sinks.clone(),
                    event: Outbound::Connection(ConnectionEvent::Open { conn: local }),
                });
            }
            _ => {
                deliveries.push(Delivery {
                    to: self.sinks.clone(),
                    event: Outbound::Relay(RelayEvent::PeerUnavailable {
                        peer_id: peer_id.to_string(),
                    }),
                });
                deliveries.push(Delivery {
                    to: self.sinks.clone(),
                    event: Outbound::Connection(ConnectionEvent::Error {
                        conn: local,
                        message: format!("peer unavailable: {peer_id}"),
                    }),
                });
            }
        }
        drop(state);

        deliver(deliveries).await;
        Ok(local)
    }

    async fn send(&mut self, conn: ConnectionId, data: String) -> Result<(), SessionError> {
        let state = self.hub.state.read().await;
        let target = state.connections.get(&conn).and_then(|link| {
            state
                .peers
                .get(&link.peer)
                .map(|sinks| (sinks.clone(), link.remote))
        });
        drop(state);

        let (sinks, remote) =
            target.ok_or_else(|| SessionError::Signaling(format!("{conn} is not open")))?;
        sinks
            .connection(ConnectionEvent::Data { conn: remote, data })
            .await;
        Ok(())
    }

    async fn close_connection(&mut self, conn: ConnectionId) {
        let mut state = self.hub.state.write().await;
        let Some(link) = state.connections.remove(&conn) else {
            return;
        };
        state.connections.remove(&link.remote);
        let sinks = state.peers.get(&link.peer).cloned();
        drop(state);

        if let Some(sinks) = sinks {
            sinks
                .connection(ConnectionEvent::Closed { conn: link.remote })
                .await;
        }
    }

    async fn call(
        &mut self,
        peer_id: &str,
        stream: StreamDescriptor,
    ) -> Result<CallId, SessionError> {
        let me = self.registered_id()?;
        let mut state = self.hub.state.write().await;
        let local = CallId(state.next());

        let delivery = match state.peers.get(peer_id).cloned() {
            Some(remote_sinks) if peer_id != me => {
                let remote = CallId(state.next());
                state.calls.insert(
                    local,
                    CallLink {
                        owner: me.clone(),
                        peer: peer_id.to_string(),
                        remote,
                        offered: None,
                    },
                );
                state.calls.insert(
                    remote,
                    CallLink {
                        owner: peer_id.to_string(),
                        peer: me.clone(),
                        remote: local,
                        offered: Some(stream),
                    },
                );
                Delivery {
                    to: remote_sinks,
                    event: Outbound::Relay(RelayEvent::Call {
                        call: remote,
                        peer_id: me,
                        stream,
                    }),
                }
            }
            _ => Delivery {
                to: self.sinks.clone(),
                event: Outbound::Call(CallEvent::Error {
                    call: local,
                    message: format!("peer unavailable: {peer_id}"),
                }),
            },
        };
        drop(state);

        deliver(vec![delivery]).await;
        Ok(local)
    }

    async fn answer(
        &mut self,
        call: CallId,
        stream: StreamDescriptor,
    ) -> Result<(), SessionError> {
        let mut state = self.hub.state.write().await;
        let link = state
            .calls
            .get_mut(&call)
            .ok_or_else(|| SessionError::Signaling(format!("{call} is not ringing")))?;
        let offered = link
            .offered
            .take()
            .ok_or_else(|| SessionError::Signaling(format!("{call} was already answered")))?;
        let remote = link.remote;
        let peer = link.peer.clone();
        let caller = state.peers.get(&peer).cloned();
        drop(state);

        let caller =
            caller.ok_or_else(|| SessionError::Signaling(format!("caller of {call} is gone")))?;
        self.sinks
            .call(CallEvent::Stream {
                call,
                stream: offered,
            })
            .await;
        caller
            .call(CallEvent::Stream {
                call: remote,
                stream,
            })
            .await;
        Ok(())
    }

    async fn hang_up(&mut self, call: CallId) {
        let mut state = self.hub.state.write().await;
        let Some(link) = state.calls.remove(&call) else {
            return;
        };
        state.calls.remove(&link.remote);
        let sinks = state.peers.get(&link.peer).cloned();
        drop(state);

        if let Some(sinks) = sinks {
            sinks.call(CallEvent::Closed { call: link.remote }).await;
        }
    }

    async fn destroy(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let deliveries = self.hub.state.write().await.release(&id);
        debug!(peer_id = %id, notified = deliveries.len(), "memory endpoint destroyed");
        deliver(deliveries).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> StreamDescriptor {
        StreamDescriptor {
            has_video: true,
            video_enabled: true,
            has_audio: true,
            audio_enabled: true,
        }
    }

    #[tokio::test]
    async fn register_claims_desired_id() {
        let relay = MemoryRelay::new();
        let (mut a, _events) = relay.endpoint(16);
        let id = a.register(Some("r1-ab12cd")).await.unwrap();
        assert_eq!(id, "r1-ab12cd");
        assert!(relay.is_registered("r1-ab12cd").await);
    }

    #[tokio::test]
    async fn register_conflict() {
        let relay = MemoryRelay::new();
        let (mut a, _ea) = relay.endpoint(16);
        let (mut b, _eb) = relay.endpoint(16);
        a.register(Some("room")).await.unwrap();
        let err = b.register(Some("room")).await.unwrap_err();
        assert_eq!(err, SessionError::RoomIdConflict("room".into()));
        assert!(b.id().is_none());
    }

    #[tokio::test]
    async fn register_assigns_id() {
        let relay = MemoryRelay::new();
        let (mut a, _ea) = relay.endpoint(16);
        let id = a.register(None).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(a.id(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn connect_and_exchange_data() {
        let relay = MemoryRelay::new();
        let (mut a, mut ea) = relay.endpoint(16);
        let (mut b, mut eb) = relay.endpoint(16);
        a.register(Some("room")).await.unwrap();
        let b_id = b.register(None).await.unwrap();

        let conn = b.connect("room").await.unwrap();
        assert_eq!(
            eb.connections.recv().await.unwrap(),
            ConnectionEvent::Open { conn }
        );

        let remote = match ea.relay.recv().await.unwrap() {
            RelayEvent::Connection { conn, peer_id } => {
                assert_eq!(peer_id, b_id);
                conn
            }
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(
            ea.connections.recv().await.unwrap(),
            ConnectionEvent::Open { conn: remote }
        );

        b.send(conn, "hello".into()).await.unwrap();
        assert_eq!(
            ea.connections.recv().await.unwrap(),
            ConnectionEvent::Data {
                conn: remote,
                data: "hello".into()
            }
        );
    }

    #[tokio::test]
    async fn connect_to_missing_peer() {
        let relay = MemoryRelay::new();
        let (mut b, mut eb) = relay.endpoint(16);
        b.register(None).await.unwrap();
        let conn = b.connect("nowhere").await.unwrap();
        assert_eq!(
            eb.relay.recv().await.unwrap(),
            RelayEvent::PeerUnavailable {
                peer_id: "nowhere".into()
            }
        );
        assert!(matches!(
            eb.connections.recv().await.unwrap(),
            ConnectionEvent::Error { conn: c, .. } if c == conn
        ));
    }

    #[tokio::test]
    async fn call_answer_exchanges_streams() {
        let relay = MemoryRelay::new();
        let (mut a, mut ea) = relay.endpoint(16);
        let (mut b, mut eb) = relay.endpoint(16);
        a.register(Some("a")).await.unwrap();
        b.register(Some("b")).await.unwrap();

        let audio_only = StreamDescriptor {
            has_audio: true,
            audio_enabled: true,
            ..Default::default()
        };
        let outbound = a.call("b", video()).await.unwrap();
        let inbound = match eb.relay.recv().await.unwrap() {
            RelayEvent::Call {
                call,
                peer_id,
                stream,
            } => {
                assert_eq!(peer_id, "a");
                assert_eq!(stream, video());
                call
            }
            other => panic!("unexpected event: {other:?}"),
        };

        b.answer(inbound, audio_only).await.unwrap();
        assert_eq!(
            eb.calls.recv().await.unwrap(),
            CallEvent::Stream {
                call: inbound,
                stream: video()
            }
        );
        assert_eq!(
            ea.calls.recv().await.unwrap(),
            CallEvent::Stream {
                call: outbound,
                stream: audio_only
            }
        );
        assert_eq!(relay.call_count().await, 2);

        // A second answer is rejected.
        assert!(b.answer(inbound, audio_only).await.is_err());
    }

    #[tokio::test]
    async fn call_missing_peer_reports_call_error() {
        let relay = MemoryRelay::new();
        let (mut a, mut ea) = relay.endpoint(16);
        a.register(Some("a")).await.unwrap();
        let call = a.call("ghost", video()).await.unwrap();
        assert!(matches!(
            ea.calls.recv().await.unwrap(),
            CallEvent::Error { call: c, .. } if c == call
        ));
    }

    #[tokio::test]
    async fn destroy_closes_remote_ends() {
        let relay = MemoryRelay::new();
        let (mut a, mut ea) = relay.endpoint(16);
        let (mut b, _eb) = relay.endpoint(16);
        a.register(Some("a")).await.unwrap();
        b.register(Some("b")).await.unwrap();

        let _conn = b.connect("a").await.unwrap();
        let remote_conn = match ea.relay.recv().await.unwrap() {
            RelayEvent::Connection { conn, .. } => conn,
            other => panic!("unexpected event: {other:?}"),
        };
        let _open = ea.connections.recv().await.unwrap();

        b.destroy().await;
        assert!(!relay.is_registered("b").await);
        assert_eq!(relay.peer_count().await, 1);
        assert_eq!(
            ea.connections.recv().await.unwrap(),
            ConnectionEvent::Closed { conn: remote_conn }
        );
    }

    #[tokio::test]
    async fn relay_disconnect_notifies_peer() {
        let relay = MemoryRelay::new();
        let (mut a, mut ea) = relay.endpoint(16);
        a.register(Some("a")).await.unwrap();
        relay.disconnect("a").await;
        assert_eq!(ea.relay.recv().await.unwrap(), RelayEvent::Disconnected);
        assert_eq!(ea.relay.recv().await.unwrap(), RelayEvent::Closed);
        assert!(!relay.is_registered("a").await);
    }
}
