//! Join/participants handshake.
//!
//! The room creator holds the password and answers `join` requests with a
//! full roster snapshot, then calls the newcomer. Snapshots are not
//! forwarded to peers admitted earlier, so the roster is only consistent
//! with the creator's view.

use tracing::{debug, info, warn};

use huddle_common::SessionError;

use crate::protocol::RoomMessage;
use crate::roster::RosterChange;
use crate::transport::{ConnectionId, SignalingTransport};

use super::coordinator::Coordinator;
use super::types::{Phase, Role, SessionEvent};

impl<T: SignalingTransport> Coordinator<T> {
    /// Sent by a joiner once its connection to the room is open.
    pub(super) async fn send_join(&mut self, conn: ConnectionId) {
        let Some(self_id) = self.session.self_id().map(str::to_string) else {
            return;
        };
        let join = RoomMessage::Join {
            peer_id: self_id,
            username: self.session.display_name().to_string(),
            password: self.session.request.password().to_string(),
        };
        debug!(conn = %conn, "sending join");
        if let Err(e) = self.transport.send(conn, join.encode()).await {
            self.fail(e).await;
        }
    }

    pub(super) async fn handle_message(
        &mut self,
        conn: ConnectionId,
        from: &str,
        message: RoomMessage,
    ) {
        match message {
            RoomMessage::Join {
                peer_id,
                username,
                password,
            } => self.admit(conn, &peer_id, &username, &password).await,
            RoomMessage::Participants { participants } => {
                self.merge_participants(&participants).await
            }
            RoomMessage::Error { message } => {
                if self.session.role() == Role::Joiner {
                    self.fail(SessionError::AuthFailure(message)).await;
                } else {
                    warn!(peer_id = %from, error = %message, "peer reported an error");
                    self.emit(SessionEvent::Warning(message)).await;
                }
            }
        }
    }

    async fn admit(&mut self, conn: ConnectionId, peer_id: &str, username: &str, password: &str) {
        if password != self.session.request.password() {
            info!(peer_id = %peer_id, "join rejected: incorrect password");
            self.reply(conn, &RoomMessage::incorrect_password()).await;
            return;
        }

        let change = self.session.roster.insert(peer_id, username);
        info!(peer_id = %peer_id, change = ?change, "join accepted");
        if change != RosterChange::Unchanged {
            self.emit(SessionEvent::RosterChanged(
                self.session.roster.participants().to_vec(),
            ))
            .await;
        }

        let snapshot = RoomMessage::Participants {
            participants: self.session.roster.snapshot(),
        };
        self.reply(conn, &snapshot).await;

        if !self.session.has_call_with(peer_id) {
            self.place_call(peer_id).await;
        }
    }

    async fn merge_participants(&mut self, participants: &[(String, String)]) {
        let changed = self.session.roster.merge(participants);

        if self.session.role() == Role::Joiner && !self.session.admitted {
            self.session.admitted = true;
            self.session.phase = Phase::Active;
            let self_id = self.session.self_id().unwrap_or_default().to_string();
            info!(room_id = %self.session.room_id(), peers = participants.len(), "admitted to room");
            self.emit(SessionEvent::Ready {
                self_id,
                room_id: self.session.room_id().to_string(),
                role: Role::Joiner,
            })
            .await;
        }
        if changed {
            self.emit(SessionEvent::RosterChanged(
                self.session.roster.participants().to_vec(),
            ))
            .await;
        }
        // Slots bound before the names arrived keep their label.
    }

    async fn reply(&mut self, conn: ConnectionId, message: &RoomMessage) {
        if let Err(e) = self.transport.send(conn, message.encode()).await {
            warn!(conn = %conn, error = %e, "failed to reply on connection");
        }
    }
}
