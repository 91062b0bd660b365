//! Per-connection handler: register, then forward signals.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use huddle_common::{ClientFrame, RelayFrame};

use crate::registry::PeerRegistry;

/// How long a client has to send its `register` frame.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    registry: PeerRegistry,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. The first frame must claim an id.
    let Some(desired) = read_register(&mut stream, addr).await else {
        return;
    };

    // 2. Create our receive channel and register.
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let peer_id = match registry.register(desired.as_deref(), tx).await {
        Ok(id) => id,
        Err(id) => {
            tracing::info!(peer = %addr, id = %id, "Id already taken");
            let _ = send_frame(&mut sink, &RelayFrame::IdTaken { id }).await;
            return;
        }
    };

    tracing::info!(peer = %addr, peer_id = %peer_id, "Client registered");

    if send_frame(
        &mut sink,
        &RelayFrame::Registered {
            id: peer_id.clone(),
        },
    )
    .await
    .is_err()
    {
        release(&registry, &peer_id).await;
        return;
    }

    // 3. Forwarding loop.
    loop {
        tokio::select! {
            // Frames queued for us by other connections.
            Some(msg) = rx.recv() => {
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            // Frames from this client.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Signal { to, payload }) => {
                                let delivered = match registry.route(&peer_id, &to).await {
                                    Some(peer) => {
                                        let forward = RelayFrame::Signal {
                                            from: peer_id.clone(),
                                            payload,
                                        };
                                        match serde_json::to_string(&forward) {
                                            Ok(json) => peer.send(json).await.is_ok(),
                                            Err(_) => false,
                                        }
                                    }
                                    None => false,
                                };
                                if !delivered {
                                    tracing::debug!(from = %peer_id, to = %to, "Signal target unavailable");
                                    let reply = RelayFrame::PeerUnavailable { peer_id: to };
                                    if send_frame(&mut sink, &reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Ok(ClientFrame::Unregister) => break,
                            Ok(ClientFrame::Register { .. }) => {
                                let reply = RelayFrame::Error {
                                    message: format!("already registered as {peer_id}"),
                                };
                                if send_frame(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Invalid client frame");
                                let reply = RelayFrame::Error {
                                    message: format!("invalid frame: {e}"),
                                };
                                if send_frame(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 4. Cleanup.
    tracing::info!(peer = %addr, peer_id = %peer_id, "Client disconnected");
    release(&registry, &peer_id).await;
}

/// Unregister `peer_id` and tell everyone it signalled that it is gone.
async fn release(registry: &PeerRegistry, peer_id: &str) {
    let Some(contacts) = registry.unregister(peer_id).await else {
        return;
    };
    let frame = RelayFrame::PeerLeft {
        peer_id: peer_id.to_string(),
    };
    let json = serde_json::to_string(&frame).unwrap_or_default();
    for (contact, tx) in contacts {
        if tx.send(json.clone()).await.is_err() {
            tracing::debug!(peer_id = %contact, "Contact gone before peer_left");
        }
    }
}

/// Read the first frame, which must be `register`. Returns the desired id.
async fn read_register(stream: &mut WsStream, addr: SocketAddr) -> Option<Option<String>> {
    let frame = tokio::time::timeout(REGISTER_TIMEOUT, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::Register { desired_id }) => Some(desired_id),
            Ok(_) => {
                tracing::warn!(peer = %addr, "First frame was not register");
                None
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid register frame");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text register frame");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during register");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before register");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, "Register timeout (10s)");
            None
        }
    }
}

/// Send a RelayFrame as a JSON text frame.
async fn send_frame(
    sink: &mut WsSink,
    frame: &RelayFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    sink.send(Message::Text(json.into())).await
}
