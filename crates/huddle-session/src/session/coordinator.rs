//! The per-participant event loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use huddle_common::SessionError;

use crate::media::{acquire_local_stream, MediaSource, TrackKind};
use crate::protocol::RoomMessage;
use crate::transport::{
    CallEvent, ConnectionEvent, RelayEvent, SignalingTransport, TransportEvents,
};

use super::state::{PeerLink, Session};
use super::types::{
    Phase, Role, RoomRequest, SessionCommand, SessionConfig, SessionEvent, SessionHandle,
};

/// One unit of work for the coordinator.
enum Incoming {
    Command(SessionCommand),
    Relay(RelayEvent),
    Connection(ConnectionEvent),
    Call(CallEvent),
}

/// Owns a [`Session`] and drives it from UI commands and transport events.
///
/// Handlers run to completion one at a time. Sources are polled in a fixed
/// order: commands, relay, connections, calls.
pub struct Coordinator<T: SignalingTransport> {
    pub(super) session: Session,
    pub(super) config: SessionConfig,
    pub(super) transport: T,
    events: TransportEvents,
    commands: mpsc::Receiver<SessionCommand>,
    event_tx: mpsc::Sender<SessionEvent>,
    display_source: Option<Arc<dyn MediaSource>>,
}

impl<T: SignalingTransport> Coordinator<T> {
    pub fn new(
        request: RoomRequest,
        config: SessionConfig,
        transport: T,
        events: TransportEvents,
    ) -> (Self, SessionHandle, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let (command_tx, commands) = mpsc::channel(config.event_buffer);
        let coordinator = Self {
            session: Session::new(request),
            config,
            transport,
            events,
            commands,
            event_tx,
            display_source: None,
        };
        (coordinator, SessionHandle { tx: command_tx }, event_rx)
    }

    /// Where screen captures come from. Without one, sharing fails.
    pub fn set_display_source(&mut self, source: Arc<dyn MediaSource>) {
        self.display_source = Some(source);
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(super) async fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("session event dropped, no listener");
        }
    }

    // -- startup --

    /// Acquire local media, then register with the relay.
    pub async fn start(&mut self, source: &dyn MediaSource) -> Result<String, SessionError> {
        self.acquire_media(source).await?;
        self.rendezvous().await
    }

    /// Acquire the local stream. Calls that were waiting on media are
    /// answered or placed once it is available.
    pub async fn acquire_media(&mut self, source: &dyn MediaSource) -> Result<(), SessionError> {
        if self.session.phase == Phase::Closed {
            return Err(SessionError::Closed);
        }
        if self.session.media.is_some() {
            return Ok(());
        }

        let acquired = match acquire_local_stream(source).await {
            Ok(acquired) => acquired,
            Err(e) => {
                self.fail(e.clone()).await;
                return Err(e);
            }
        };

        if let Some(reason) = acquired.fallback_reason {
            warn!(reason = %reason, "continuing with audio only");
            self.emit(SessionEvent::MediaFallback { reason }).await;
        }
        let stream = acquired.stream.descriptor();
        info!(
            video = stream.has_video,
            audio = stream.has_audio,
            "local media ready"
        );
        self.session.media = Some(acquired.stream);
        self.emit(SessionEvent::MediaReady { stream }).await;

        self.flush_waiting_calls().await;
        Ok(())
    }

    /// Obtain our identity from the relay. A creator claims the room id; a
    /// joiner takes an assigned id and connects to the room.
    pub async fn rendezvous(&mut self) -> Result<String, SessionError> {
        if self.session.phase != Phase::Idle {
            return Err(SessionError::InvalidRequest(
                "rendezvous already started".into(),
            ));
        }
        if let Err(e) = self
            .session
            .request
            .validate(self.config.min_password_length)
        {
            self.fail(e.clone()).await;
            return Err(e);
        }

        self.session.phase = Phase::Rendezvous;
        let role = self.session.role();
        let room_id = self.session.room_id().to_string();
        let desired = match role {
            Role::Creator => Some(room_id.as_str()),
            Role::Joiner => None,
        };

        let self_id = match self.transport.register(desired).await {
            Ok(id) => id,
            Err(e) => {
                self.fail(e.clone()).await;
                return Err(e);
            }
        };
        if let Err(e) = self.session.set_self_id(&self_id) {
            self.fail(e.clone()).await;
            return Err(e);
        }

        let name = self.session.display_name().to_string();
        self.session.roster.insert(&self_id, &name);
        self.emit(SessionEvent::RosterChanged(
            self.session.roster.participants().to_vec(),
        ))
        .await;

        match role {
            Role::Creator => {
                info!(room_id = %room_id, "room created");
                self.session.phase = Phase::Active;
                self.emit(SessionEvent::Ready {
                    self_id: self_id.clone(),
                    room_id,
                    role,
                })
                .await;
            }
            Role::Joiner => {
                info!(room_id = %room_id, self_id = %self_id, "joining room");
                match self.transport.connect(&room_id).await {
                    Ok(conn) => {
                        self.session.room_conn = Some(conn);
                        self.session
                            .connections
                            .insert(conn, PeerLink { peer_id: room_id });
                    }
                    Err(e) => {
                        self.fail(e.clone()).await;
                        return Err(e);
                    }
                }
            }
        }
        Ok(self_id)
    }

    // -- event loop --

    /// Wait for and handle one event. Returns false once the session is
    /// closed.
    pub async fn step(&mut self) -> bool {
        if self.session.phase == Phase::Closed {
            return false;
        }

        let incoming = tokio::select! {
            biased;
            Some(cmd) = self.commands.recv() => Some(Incoming::Command(cmd)),
            Some(ev) = self.events.relay.recv() => Some(Incoming::Relay(ev)),
            Some(ev) = self.events.connections.recv() => Some(Incoming::Connection(ev)),
            Some(ev) = self.events.calls.recv() => Some(Incoming::Call(ev)),
            else => None,
        };

        match incoming {
            Some(incoming) => self.dispatch(incoming).await,
            None => self.fail(SessionError::Closed).await,
        }
        self.session.phase != Phase::Closed
    }

    /// Handle every event that is already queued, in source order, without
    /// waiting. Returns how many were handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while self.session.phase != Phase::Closed {
            let Some(incoming) = self.try_next() else {
                break;
            };
            self.dispatch(incoming).await;
            handled += 1;
        }
        handled
    }

    /// Run until the session closes.
    pub async fn run(mut self) {
        while self.step().await {}
        debug!("coordinator stopped");
    }

    fn try_next(&mut self) -> Option<Incoming> {
        if let Ok(cmd) = self.commands.try_recv() {
            return Some(Incoming::Command(cmd));
        }
        if let Ok(ev) = self.events.relay.try_recv() {
            return Some(Incoming::Relay(ev));
        }
        if let Ok(ev) = self.events.connections.try_recv() {
            return Some(Incoming::Connection(ev));
        }
        if let Ok(ev) = self.events.calls.try_recv() {
            return Some(Incoming::Call(ev));
        }
        None
    }

    async fn dispatch(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::Command(cmd) => self.handle_command(cmd).await,
            Incoming::Relay(ev) => self.handle_relay(ev).await,
            Incoming::Connection(ev) => self.handle_connection(ev).await,
            Incoming::Call(ev) => self.handle_call(ev).await,
        }
    }

    // -- handlers --

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Leave => self.leave().await,
            SessionCommand::ToggleVideo => self.toggle(TrackKind::Video).await,
            SessionCommand::ToggleAudio => self.toggle(TrackKind::Audio).await,
            SessionCommand::ShareScreen => self.share_screen().await,
            SessionCommand::StopShare => self.stop_share().await,
        }
    }

    async fn share_screen(&mut self) {
        match self.session.media.as_ref() {
            None => {
                self.share_failed("local media is not ready").await;
                return;
            }
            Some(media) if media.is_sharing_screen() => {
                debug!("screen already shared");
                return;
            }
            Some(_) => {}
        }
        let Some(source) = self.display_source.clone() else {
            self.share_failed("screen capture unavailable").await;
            return;
        };

        let track = match source.open_display().await {
            Ok(track) => track,
            Err(e) => {
                self.share_failed(&e.to_string()).await;
                return;
            }
        };
        let started = self
            .session
            .media
            .as_mut()
            .is_some_and(|media| media.start_screen_share(track));
        if started {
            info!("screen sharing started");
            self.emit(SessionEvent::ScreenShare { active: true }).await;
        }
    }

    /// Also sent by the UI when the platform ends the capture.
    async fn stop_share(&mut self) {
        let stopped = self
            .session
            .media
            .as_mut()
            .is_some_and(|media| media.stop_screen_share());
        if stopped {
            info!("screen sharing stopped");
            self.emit(SessionEvent::ScreenShare { active: false }).await;
        }
    }

    async fn share_failed(&mut self, reason: &str) {
        warn!(reason = %reason, "screen sharing failed");
        self.emit(SessionEvent::Warning(format!(
            "Failed to share screen: {reason}"
        )))
        .await;
    }

    async fn toggle(&mut self, kind: TrackKind) {
        let toggled = self.session.media.as_mut().and_then(|m| m.toggle(kind));
        match toggled {
            Some(enabled) => {
                info!(kind = %kind, enabled, "local track toggled");
                self.emit(SessionEvent::LocalTrackToggled { kind, enabled })
                    .await;
            }
            None => debug!(kind = %kind, "no local track to toggle"),
        }
    }

    async fn handle_relay(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connection { conn, peer_id } => {
                debug!(conn = %conn, peer_id = %peer_id, "inbound connection");
                self.session.connections.insert(conn, PeerLink { peer_id });
            }
            RelayEvent::Call {
                call,
                peer_id,
                stream,
            } => self.accept_call(call, peer_id, stream).await,
            RelayEvent::PeerUnavailable { peer_id } => {
                let joining = self.session.role() == Role::Joiner
                    && !self.session.admitted
                    && peer_id == self.session.room_id();
                if joining {
                    self.fail(SessionError::Signaling(format!(
                        "Meeting not found: {peer_id}"
                    )))
                    .await;
                } else {
                    debug!(peer_id = %peer_id, "peer unavailable");
                }
            }
            RelayEvent::Disconnected => {
                warn!("lost connection to relay");
                self.emit(SessionEvent::ConnectionStatus { connected: false })
                    .await;
            }
            RelayEvent::Closed => {
                self.fail(SessionError::Signaling("relay connection closed".into()))
                    .await;
            }
            RelayEvent::Error(message) => {
                self.fail(SessionError::Signaling(message)).await;
            }
        }
    }

    async fn handle_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Open { conn } => {
                if self.session.room_conn == Some(conn) {
                    self.send_join(conn).await;
                }
            }
            ConnectionEvent::Data { conn, data } => {
                let Some(peer_id) = self
                    .session
                    .connections
                    .get(&conn)
                    .map(|l| l.peer_id.clone())
                else {
                    debug!(conn = %conn, "data on unknown connection");
                    return;
                };
                match RoomMessage::decode(&data) {
                    Ok(message) => self.handle_message(conn, &peer_id, message).await,
                    Err(e) => {
                        warn!(peer_id = %peer_id, error = %e, "rejected room message");
                        self.emit(SessionEvent::Warning(e.to_string())).await;
                    }
                }
            }
            ConnectionEvent::Error { conn, message } => {
                self.session.connections.remove(&conn);
                if self.session.room_conn == Some(conn) && !self.session.admitted {
                    self.session.room_conn = None;
                    self.fail(SessionError::Signaling(message)).await;
                } else {
                    warn!(conn = %conn, error = %message, "connection error");
                }
            }
            ConnectionEvent::Closed { conn } => {
                self.session.connections.remove(&conn);
                if self.session.room_conn == Some(conn) {
                    self.session.room_conn = None;
                    if !self.session.admitted {
                        self.fail(SessionError::Signaling(
                            "room closed the connection before admitting us".into(),
                        ))
                        .await;
                        return;
                    }
                }
                debug!(conn = %conn, "connection closed");
            }
        }
    }

    // -- teardown --

    /// Stop local media, release the relay identity, then clear state.
    pub async fn leave(&mut self) {
        if self.session.phase == Phase::Closed {
            return;
        }
        info!(room_id = %self.session.room_id(), "leaving room");
        self.teardown().await;
        self.emit(SessionEvent::Left).await;
    }

    /// End the session on an error. Non-terminal errors are only reported.
    pub(super) async fn fail(&mut self, error: SessionError) {
        if !error.is_terminal() {
            self.emit(SessionEvent::Warning(error.to_string())).await;
            return;
        }
        if self.session.phase == Phase::Closed {
            return;
        }
        warn!(error = %error, "session terminated");
        self.teardown().await;
        self.emit(SessionEvent::Terminated(error)).await;
    }

    async fn teardown(&mut self) {
        self.session.phase = Phase::Closed;
        if let Some(media) = self.session.media.as_mut() {
            media.stop_all();
        }
        self.transport.destroy().await;
        self.session.clear();
    }
}
