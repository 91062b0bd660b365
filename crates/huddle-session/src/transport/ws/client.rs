use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use huddle_common::{ClientFrame, SessionError, SignalPayload, StreamDescriptor};

use super::links::LinkTable;
use super::reader::{read_loop, ReaderContext};
use crate::transport::{
    event_channels, CallEvent, CallId, ConnectionId, SignalingTransport, TransportEvents,
};

/// How long the relay gets to confirm a registration.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `destroy` waits for queued frames to reach the socket.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub connect_timeout: Duration,
    /// Capacity of each event channel and of the outbound frame queue.
    pub event_buffer: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            event_buffer: 256,
        }
    }
}

/// Instructions for the writer task.
#[derive(Debug)]
pub(crate) enum WsCommand {
    Frame(ClientFrame),
    Close,
}

/// Signaling over a WebSocket relay.
pub struct WsTransport {
    commands: mpsc::Sender<WsCommand>,
    ctx: ReaderContext,
    id: Option<String>,
    /// Taken by `destroy` once the queue has been flushed.
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl WsTransport {
    /// Connect to the relay at `url`. The returned transport is not yet
    /// registered.
    pub async fn connect(
        url: &str,
        config: WsConfig,
    ) -> Result<(Self, TransportEvents), SessionError> {
        info!(url = %url, "connecting to relay");
        let (ws, _) =
            match tokio::time::timeout(config.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
            {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    return Err(SessionError::Signaling(format!(
                        "failed to reach relay at {url}: {e}"
                    )))
                }
                Err(_) => {
                    return Err(SessionError::Signaling(format!(
                        "relay connection timed out after {}s",
                        config.connect_timeout.as_secs()
                    )))
                }
            };

        let (ws_write, ws_read) = ws.split();
        let (sinks, events) = event_channels(config.event_buffer);
        let (commands, command_rx) = mpsc::channel(config.event_buffer);

        let ctx = ReaderContext {
            links: Arc::new(Mutex::new(LinkTable::default())),
            pending_register: Arc::new(Mutex::new(None)),
            sinks,
            commands: commands.clone(),
        };

        let writer = tokio::spawn(write_loop(ws_write, command_rx));
        let reader = tokio::spawn(read_loop(ws_read, ctx.clone()));

        Ok((
            Self {
                commands,
                ctx,
                id: None,
                writer: Some(writer),
                reader,
            },
            events,
        ))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    async fn send_frame(&self, frame: ClientFrame) -> Result<(), SessionError> {
        self.commands
            .send(WsCommand::Frame(frame))
            .await
            .map_err(|_| SessionError::Signaling("relay connection closed".into()))
    }

    async fn signal(&self, to: &str, payload: SignalPayload) -> Result<(), SessionError> {
        self.send_frame(ClientFrame::Signal {
            to: to.to_string(),
            payload,
        })
        .await
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

#[async_trait]
impl SignalingTransport for WsTransport {
    async fn register(&mut self, desired_id: Option<&str>) -> Result<String, SessionError> {
        if let Some(id) = &self.id {
            return Err(SessionError::Signaling(format!("already registered as {id}")));
        }

        let (tx, rx) = oneshot::channel();
        *self.ctx.pending_register.lock().await = Some(tx);
        self.send_frame(ClientFrame::Register {
            desired_id: desired_id.map(str::to_string),
        })
        .await?;

        match tokio::time::timeout(REGISTER_TIMEOUT, rx).await {
            Ok(Ok(Ok(id))) => {
                info!(peer_id = %id, "registered with relay");
                self.id = Some(id.clone());
                Ok(id)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(SessionError::Signaling(
                "relay connection closed during registration".into(),
            )),
            Err(_) => {
                self.ctx.pending_register.lock().await.take();
                Err(SessionError::Signaling(format!(
                    "relay did not confirm registration within {}s",
                    REGISTER_TIMEOUT.as_secs()
                )))
            }
        }
    }

    async fn connect(&mut self, peer_id: &str) -> Result<ConnectionId, SessionError> {
        let (conn, conn_id) = self.ctx.links.lock().await.add_outbound_conn(peer_id);
        if let Err(e) = self.signal(peer_id, SignalPayload::Connect { conn_id }).await {
            self.ctx.links.lock().await.remove_conn(conn);
            return Err(e);
        }
        debug!(peer_id = %peer_id, conn = %conn, "connection requested");
        Ok(conn)
    }

    async fn send(&mut self, conn: ConnectionId, data: String) -> Result<(), SessionError> {
        let entry = self.ctx.links.lock().await.conn(conn).cloned();
        match entry {
            Some(entry) if entry.open => {
                self.signal(
                    &entry.peer,
                    SignalPayload::Data {
                        conn_id: entry.wire_id,
                        data,
                    },
                )
                .await
            }
            _ => Err(SessionError::Signaling(format!("{conn} is not open"))),
        }
    }

    async fn close_connection(&mut self, conn: ConnectionId) {
        let entry = self.ctx.links.lock().await.remove_conn(conn);
        if let Some(entry) = entry {
            let payload = SignalPayload::CloseConnection {
                conn_id: entry.wire_id,
            };
            if self.signal(&entry.peer, payload).await.is_err() {
                debug!(conn = %conn, "close not delivered, relay gone");
            }
        }
    }

    async fn call(
        &mut self,
        peer_id: &str,
        stream: StreamDescriptor,
    ) -> Result<CallId, SessionError> {
        let (call, call_id) = self.ctx.links.lock().await.add_outbound_call(peer_id);
        if let Err(e) = self
            .signal(peer_id, SignalPayload::Call { call_id, stream })
            .await
        {
            self.ctx.links.lock().await.remove_call(call);
            return Err(e);
        }
        debug!(peer_id = %peer_id, call = %call, "call placed");
        Ok(call)
    }

    async fn answer(
        &mut self,
        call: CallId,
        stream: StreamDescriptor,
    ) -> Result<(), SessionError> {
        let (peer, call_id, offered) = self
            .ctx
            .links
            .lock()
            .await
            .answer_inbound(call)
            .ok_or_else(|| SessionError::Signaling(format!("{call} is not ringing")))?;

        self.signal(&peer, SignalPayload::Answer { call_id, stream })
            .await?;
        self.ctx
            .sinks
            .call(CallEvent::Stream {
                call,
                stream: offered,
            })
            .await;
        Ok(())
    }

    async fn hang_up(&mut self, call: CallId) {
        let entry = self.ctx.links.lock().await.remove_call(call);
        if let Some(entry) = entry {
            let payload = SignalPayload::HangUp {
                call_id: entry.wire_id,
            };
            if self.signal(&entry.peer, payload).await.is_err() {
                debug!(call = %call, "hang up not delivered, relay gone");
            }
        }
    }

    async fn destroy(&mut self) {
        // Stop reporting events before tearing down links.
        self.reader.abort();

        let (conns, calls) = self.ctx.links.lock().await.drain();
        for entry in calls {
            let _ = self
                .signal(
                    &entry.peer,
                    SignalPayload::HangUp {
                        call_id: entry.wire_id,
                    },
                )
                .await;
        }
        for entry in conns {
            let _ = self
                .signal(
                    &entry.peer,
                    SignalPayload::CloseConnection {
                        conn_id: entry.wire_id,
                    },
                )
                .await;
        }

        if self.id.take().is_some() {
            let _ = self.send_frame(ClientFrame::Unregister).await;
        }
        if self.commands.send(WsCommand::Close).await.is_err() {
            debug!("writer already stopped");
        }
        if let Some(mut writer) = self.writer.take() {
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
                warn!("relay writer did not flush in time");
                writer.abort();
            }
        }
        info!("relay transport destroyed");
    }
}

/// Drain the command queue into the socket until closed.
async fn write_loop<S>(mut sink: S, mut commands: mpsc::Receiver<WsCommand>)
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(command) = commands.recv().await {
        match command {
            WsCommand::Frame(frame) => {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to encode relay frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(json.into())).await {
                    warn!(error = %e, "relay write failed");
                    break;
                }
            }
            WsCommand::Close => {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }
    debug!("relay writer stopped");
}
