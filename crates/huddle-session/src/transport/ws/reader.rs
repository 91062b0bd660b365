//! Relay frame handling for the WebSocket transport.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, info, warn};

use huddle_common::{ClientFrame, RelayFrame, SessionError, SignalPayload};

use super::client::WsCommand;
use super::links::LinkTable;
use crate::transport::{CallEvent, ConnectionEvent, EventSinks, RelayEvent};

pub(crate) type RegisterReply = oneshot::Sender<Result<String, SessionError>>;

/// State shared between the transport handle and its reader task.
#[derive(Clone)]
pub(crate) struct ReaderContext {
    pub(crate) links: Arc<Mutex<LinkTable>>,
    pub(crate) pending_register: Arc<Mutex<Option<RegisterReply>>>,
    pub(crate) sinks: EventSinks,
    pub(crate) commands: mpsc::Sender<WsCommand>,
}

/// Read frames until the socket ends, then report the relay as gone.
pub(crate) async fn read_loop<S>(mut stream: S, ctx: ReaderContext)
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                Ok(frame) => ctx.handle_frame(frame).await,
                Err(e) => warn!(error = %e, "unrecognized relay frame"),
            },
            Ok(WsMessage::Close(_)) => {
                info!("relay closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "relay socket error");
                break;
            }
            _ => {}
        }
    }

    ctx.resolve_register(Err(SessionError::Signaling(
        "relay connection closed during registration".into(),
    )))
    .await;
    ctx.sinks.relay(RelayEvent::Disconnected).await;
    ctx.sinks.relay(RelayEvent::Closed).await;
}

impl ReaderContext {
    /// Complete a pending `register` call. Returns false if none was waiting.
    async fn resolve_register(&self, outcome: Result<String, SessionError>) -> bool {
        match self.pending_register.lock().await.take() {
            Some(reply) => {
                let _ = reply.send(outcome);
                true
            }
            None => false,
        }
    }

    pub(crate) async fn handle_frame(&self, frame: RelayFrame) {
        match frame {
            RelayFrame::Registered { id } => {
                if !self.resolve_register(Ok(id.clone())).await {
                    debug!(id = %id, "unsolicited registered frame");
                }
            }
            RelayFrame::IdTaken { id } => {
                if !self
                    .resolve_register(Err(SessionError::RoomIdConflict(id.clone())))
                    .await
                {
                    debug!(id = %id, "unsolicited id_taken frame");
                }
            }
            RelayFrame::Error { message } => {
                if !self
                    .resolve_register(Err(SessionError::Signaling(message.clone())))
                    .await
                {
                    self.sinks.relay(RelayEvent::Error(message)).await;
                }
            }
            RelayFrame::PeerUnavailable { peer_id } => {
                let (conns, calls) = self.links.lock().await.fail_pending(&peer_id);
                self.sinks
                    .relay(RelayEvent::PeerUnavailable {
                        peer_id: peer_id.clone(),
                    })
                    .await;
                for conn in conns {
                    self.sinks
                        .connection(ConnectionEvent::Error {
                            conn,
                            message: format!("peer unavailable: {peer_id}"),
                        })
                        .await;
                }
                for call in calls {
                    self.sinks
                        .call(CallEvent::Error {
                            call,
                            message: format!("peer unavailable: {peer_id}"),
                        })
                        .await;
                }
            }
            RelayFrame::PeerLeft { peer_id } => {
                let (conns, calls) = self.links.lock().await.remove_peer(&peer_id);
                info!(
                    peer_id = %peer_id,
                    connections = conns.len(),
                    calls = calls.len(),
                    "peer left the relay"
                );
                for conn in conns {
                    self.sinks.connection(ConnectionEvent::Closed { conn }).await;
                }
                for call in calls {
                    self.sinks.call(CallEvent::Closed { call }).await;
                }
            }
            RelayFrame::Signal { from, payload } => self.handle_signal(from, payload).await,
        }
    }

    async fn handle_signal(&self, from: String, payload: SignalPayload) {
        match payload {
            SignalPayload::Connect { conn_id } => {
                let conn = self.links.lock().await.add_inbound_conn(&from, &conn_id);
                let ack = ClientFrame::Signal {
                    to: from.clone(),
                    payload: SignalPayload::ConnectAck { conn_id },
                };
                if self.commands.send(WsCommand::Frame(ack)).await.is_err() {
                    debug!("writer gone, connect ack dropped");
                }
                self.sinks
                    .relay(RelayEvent::Connection {
                        conn,
                        peer_id: from,
                    })
                    .await;
                self.sinks.connection(ConnectionEvent::Open { conn }).await;
            }
            SignalPayload::ConnectAck { conn_id } => {
                let mut links = self.links.lock().await;
                let opened = links
                    .conn_by_wire(&from, &conn_id)
                    .filter(|conn| links.mark_open(*conn));
                drop(links);
                match opened {
                    Some(conn) => self.sinks.connection(ConnectionEvent::Open { conn }).await,
                    None => debug!(peer = %from, conn_id = %conn_id, "stray connect ack"),
                }
            }
            SignalPayload::Data { conn_id, data } => {
                let conn = self.links.lock().await.conn_by_wire(&from, &conn_id);
                match conn {
                    Some(conn) => {
                        self.sinks
                            .connection(ConnectionEvent::Data { conn, data })
                            .await
                    }
                    None => debug!(peer = %from, conn_id = %conn_id, "data for unknown connection"),
                }
            }
            SignalPayload::CloseConnection { conn_id } => {
                let mut links = self.links.lock().await;
                let closed = links
                    .conn_by_wire(&from, &conn_id)
                    .and_then(|conn| links.remove_conn(conn).map(|_| conn));
                drop(links);
                if let Some(conn) = closed {
                    self.sinks.connection(ConnectionEvent::Closed { conn }).await;
                }
            }
            SignalPayload::Call { call_id, stream } => {
                let call = self
                    .links
                    .lock()
                    .await
                    .add_inbound_call(&from, &call_id, stream);
                match call {
                    Some(call) => {
                        self.sinks
                            .relay(RelayEvent::Call {
                                call,
                                peer_id: from,
                                stream,
                            })
                            .await
                    }
                    None => debug!(peer = %from, call_id = %call_id, "repeated call offer"),
                }
            }
            SignalPayload::Answer { call_id, stream } => {
                let mut links = self.links.lock().await;
                let answered = links
                    .call_by_wire(&from, &call_id)
                    .filter(|call| links.mark_answered(*call));
                drop(links);
                match answered {
                    Some(call) => self.sinks.call(CallEvent::Stream { call, stream }).await,
                    None => debug!(peer = %from, call_id = %call_id, "stray answer"),
                }
            }
            SignalPayload::HangUp { call_id } => {
                let mut links = self.links.lock().await;
                let closed = links
                    .call_by_wire(&from, &call_id)
                    .and_then(|call| links.remove_call(call).map(|_| call));
                drop(links);
                if let Some(call) = closed {
                    self.sinks.call(CallEvent::Closed { call }).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{event_channels, TransportEvents};
    use huddle_common::StreamDescriptor;

    fn context() -> (ReaderContext, TransportEvents, mpsc::Receiver<WsCommand>) {
        let (sinks, events) = event_channels(16);
        let (commands, command_rx) = mpsc::channel(16);
        let ctx = ReaderContext {
            links: Arc::default(),
            pending_register: Arc::default(),
            sinks,
            commands,
        };
        (ctx, events, command_rx)
    }

    #[tokio::test]
    async fn registered_resolves_pending_register() {
        let (ctx, _events, _cmds) = context();
        let (tx, rx) = oneshot::channel();
        *ctx.pending_register.lock().await = Some(tx);
        ctx.handle_frame(RelayFrame::Registered { id: "r1".into() })
            .await;
        assert_eq!(rx.await.unwrap(), Ok("r1".to_string()));
    }

    #[tokio::test]
    async fn id_taken_is_room_conflict() {
        let (ctx, _events, _cmds) = context();
        let (tx, rx) = oneshot::channel();
        *ctx.pending_register.lock().await = Some(tx);
        ctx.handle_frame(RelayFrame::IdTaken { id: "r1".into() })
            .await;
        assert_eq!(
            rx.await.unwrap(),
            Err(SessionError::RoomIdConflict("r1".into()))
        );
    }

    #[tokio::test]
    async fn error_without_pending_register_is_relay_event() {
        let (ctx, mut events, _cmds) = context();
        ctx.handle_frame(RelayFrame::Error {
            message: "rate limited".into(),
        })
        .await;
        assert_eq!(
            events.relay.recv().await.unwrap(),
            RelayEvent::Error("rate limited".into())
        );
    }

    #[tokio::test]
    async fn inbound_connect_is_acked_and_opened() {
        let (ctx, mut events, mut cmds) = context();
        ctx.handle_frame(RelayFrame::Signal {
            from: "p2".into(),
            payload: SignalPayload::Connect {
                conn_id: "w1".into(),
            },
        })
        .await;

        match cmds.recv().await.unwrap() {
            WsCommand::Frame(ClientFrame::Signal { to, payload }) => {
                assert_eq!(to, "p2");
                assert_eq!(
                    payload,
                    SignalPayload::ConnectAck {
                        conn_id: "w1".into()
                    }
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
        let conn = match events.relay.recv().await.unwrap() {
            RelayEvent::Connection { conn, peer_id } => {
                assert_eq!(peer_id, "p2");
                conn
            }
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(
            events.connections.recv().await.unwrap(),
            ConnectionEvent::Open { conn }
        );

        ctx.handle_frame(RelayFrame::Signal {
            from: "p2".into(),
            payload: SignalPayload::Data {
                conn_id: "w1".into(),
                data: "hi".into(),
            },
        })
        .await;
        assert_eq!(
            events.connections.recv().await.unwrap(),
            ConnectionEvent::Data {
                conn,
                data: "hi".into()
            }
        );
    }

    #[tokio::test]
    async fn peer_unavailable_fails_waiting_links() {
        let (ctx, mut events, _cmds) = context();
        let (conn, _) = ctx.links.lock().await.add_outbound_conn("room");
        let (call, _) = ctx.links.lock().await.add_outbound_call("room");

        ctx.handle_frame(RelayFrame::PeerUnavailable {
            peer_id: "room".into(),
        })
        .await;

        assert_eq!(
            events.relay.recv().await.unwrap(),
            RelayEvent::PeerUnavailable {
                peer_id: "room".into()
            }
        );
        assert!(matches!(
            events.connections.recv().await.unwrap(),
            ConnectionEvent::Error { conn: c, .. } if c == conn
        ));
        assert!(matches!(
            events.calls.recv().await.unwrap(),
            CallEvent::Error { call: c, .. } if c == call
        ));
    }

    #[tokio::test]
    async fn answer_and_hang_up_outbound_call() {
        let (ctx, mut events, _cmds) = context();
        let (call, wire) = ctx.links.lock().await.add_outbound_call("p2");
        let stream = StreamDescriptor {
            has_audio: true,
            audio_enabled: true,
            ..Default::default()
        };

        ctx.handle_frame(RelayFrame::Signal {
            from: "p2".into(),
            payload: SignalPayload::Answer {
                call_id: wire.clone(),
                stream,
            },
        })
        .await;
        assert_eq!(
            events.calls.recv().await.unwrap(),
            CallEvent::Stream { call, stream }
        );

        ctx.handle_frame(RelayFrame::Signal {
            from: "p2".into(),
            payload: SignalPayload::HangUp { call_id: wire },
        })
        .await;
        assert_eq!(
            events.calls.recv().await.unwrap(),
            CallEvent::Closed { call }
        );
    }

    #[tokio::test]
    async fn peer_left_closes_its_links() {
        let (ctx, mut events, _cmds) = context();
        let (conn, _) = ctx.links.lock().await.add_outbound_conn("p2");
        ctx.links.lock().await.mark_open(conn);
        let call = ctx
            .links
            .lock()
            .await
            .add_inbound_call("p2", "k1", StreamDescriptor::default())
            .unwrap();

        ctx.handle_frame(RelayFrame::PeerLeft {
            peer_id: "p2".into(),
        })
        .await;

        assert_eq!(
            events.connections.recv().await.unwrap(),
            ConnectionEvent::Closed { conn }
        );
        assert_eq!(
            events.calls.recv().await.unwrap(),
            CallEvent::Closed { call }
        );
        assert!(events.relay.try_recv().is_err());
    }

    #[tokio::test]
    async fn socket_end_reports_disconnect() {
        let (ctx, mut events, _cmds) = context();
        let stream = futures_util::stream::empty::<Result<WsMessage, tungstenite::Error>>();
        read_loop(stream, ctx).await;
        assert_eq!(events.relay.recv().await.unwrap(), RelayEvent::Disconnected);
        assert_eq!(events.relay.recv().await.unwrap(), RelayEvent::Closed);
    }
}
