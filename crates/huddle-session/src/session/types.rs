//! Requests, configuration, and events for a room session.

use tokio::sync::mpsc;

use huddle_common::{RoomIdGenerator, SessionError, StreamDescriptor};

use crate::media::TrackKind;
use crate::roster::Participant;

/// Label used for a remote peer whose name is not in the roster.
pub const DEFAULT_PARTICIPANT_LABEL: &str = "Participant";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Joiner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rendezvous,
    Active,
    Closed,
}

/// What the local user asked for: create a room or join one.
///
/// Inputs are trimmed on construction and checked by [`RoomRequest::validate`]
/// before anything reaches the relay.
#[derive(Clone, PartialEq, Eq)]
pub struct RoomRequest {
    role: Role,
    room_id: String,
    display_name: String,
    password: String,
}

impl RoomRequest {
    /// Create a room under a freshly generated id.
    pub fn create(ids: &dyn RoomIdGenerator, display_name: &str, password: &str) -> Self {
        Self::create_with_id(&ids.generate(), display_name, password)
    }

    /// Create a room under a caller-chosen id.
    pub fn create_with_id(room_id: &str, display_name: &str, password: &str) -> Self {
        Self {
            role: Role::Creator,
            room_id: room_id.trim().to_string(),
            display_name: display_name.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    pub fn join(room_id: &str, display_name: &str, password: &str) -> Self {
        Self {
            role: Role::Joiner,
            room_id: room_id.trim().to_string(),
            display_name: display_name.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn validate(&self, min_password_length: usize) -> Result<(), SessionError> {
        if self.display_name.is_empty() {
            return Err(SessionError::InvalidRequest("display name is required".into()));
        }
        if self.room_id.is_empty() {
            return Err(SessionError::InvalidRequest("meeting id is required".into()));
        }
        if self.password.is_empty() {
            return Err(SessionError::InvalidRequest("password is required".into()));
        }
        // Only a new room's password has a minimum; a joiner's guess is
        // checked by whoever admits it.
        let min = min_password_length.max(1);
        if self.role == Role::Creator && self.password.chars().count() < min {
            return Err(SessionError::InvalidRequest(format!(
                "password must be at least {min} characters"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RoomRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRequest")
            .field("role", &self.role)
            .field("room_id", &self.room_id)
            .field("display_name", &self.display_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub min_password_length: usize,
    /// Capacity of the session event and command channels.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_password_length: 4,
            event_buffer: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Presentation record for one remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySlot {
    pub peer_id: String,
    pub label: String,
    /// Fixed when the slot is bound; later track changes do not flip it.
    pub show_placeholder: bool,
    pub stream: StreamDescriptor,
}

/// Events emitted by the coordinator for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MediaReady {
        stream: StreamDescriptor,
    },
    /// The full media request failed and audio-only was used instead.
    MediaFallback {
        reason: String,
    },
    Ready {
        self_id: String,
        room_id: String,
        role: Role,
    },
    RosterChanged(Vec<Participant>),
    SlotAdded(DisplaySlot),
    SlotRemoved {
        peer_id: String,
    },
    CallFailed {
        peer_id: String,
        reason: String,
    },
    LocalTrackToggled {
        kind: TrackKind,
        enabled: bool,
    },
    /// The local video now shows the screen (`true`) or the camera again.
    ScreenShare {
        active: bool,
    },
    ConnectionStatus {
        connected: bool,
    },
    /// Something went wrong that did not end the session.
    Warning(String),
    Terminated(SessionError),
    Left,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Leave,
    ToggleVideo,
    ToggleAudio,
    ShareScreen,
    StopShare,
}

/// Cloneable handle for driving a running coordinator.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub(crate) tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn leave(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Leave).await
    }

    pub async fn toggle_video(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ToggleVideo).await
    }

    pub async fn toggle_audio(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ToggleAudio).await
    }

    pub async fn share_screen(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ShareScreen).await
    }

    pub async fn stop_share(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StopShare).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_trims_inputs() {
        let req = RoomRequest::join("  r1-ab12cd ", " Bob ", " pass ");
        assert_eq!(req.room_id(), "r1-ab12cd");
        assert_eq!(req.display_name(), "Bob");
        assert_eq!(req.password(), "pass");
        assert!(req.validate(4).is_ok());
    }

    #[test]
    fn short_password_rejected() {
        let req = RoomRequest::create_with_id("r1", "Alice", "abc");
        assert_eq!(
            req.validate(4),
            Err(SessionError::InvalidRequest(
                "password must be at least 4 characters".into()
            ))
        );
    }

    #[test]
    fn blank_fields_rejected() {
        assert!(RoomRequest::join("r1", "   ", "pass").validate(4).is_err());
        assert!(RoomRequest::join("", "Bob", "pass").validate(4).is_err());
        assert!(RoomRequest::join("r1", "Bob", "   ").validate(1).is_err());
    }

    #[test]
    fn minimum_never_below_one() {
        let req = RoomRequest::create_with_id("r1", "Alice", "x");
        assert!(req.validate(0).is_ok());
        assert!(req.validate(2).is_err());
    }

    #[test]
    fn joiner_password_has_no_minimum() {
        let req = RoomRequest::join("r1", "Bob", "abc");
        assert!(req.validate(4).is_ok());
    }

    #[test]
    fn create_uses_generator() {
        struct Fixed;
        impl RoomIdGenerator for Fixed {
            fn generate(&self) -> String {
                "r1-ab12cd".into()
            }
        }
        let req = RoomRequest::create(&Fixed, "Alice", "pass");
        assert_eq!(req.role(), Role::Creator);
        assert_eq!(req.room_id(), "r1-ab12cd");
    }

    #[test]
    fn debug_redacts_password() {
        let req = RoomRequest::join("r1", "Bob", "hunter22");
        let out = format!("{req:?}");
        assert!(!out.contains("hunter22"));
        assert!(out.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn handle_reports_closed_session() {
        let (tx, rx) = mpsc::channel(1);
        let handle = SessionHandle { tx };
        drop(rx);
        assert_eq!(handle.leave().await, Err(SessionError::Closed));
    }
}
