use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures surfaced by a room session.
///
/// Every variant carries the originating reason text so the user always
/// sees why something failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The requested room id is already claimed on the relay.
    #[error("room id already in use: {0}")]
    RoomIdConflict(String),

    #[error("signaling error: {0}")]
    Signaling(String),

    /// The room creator rejected our join handshake.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("media access error: {0}")]
    MediaAccess(String),

    /// A call to a single peer failed. Other calls are unaffected.
    #[error("call to {peer_id} failed: {reason}")]
    CallSetup { peer_id: String, reason: String },

    /// A handshake message could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether this error ends the whole session.
    ///
    /// Call failures stay local to one peer and protocol errors drop a single
    /// message; everything else forces a full restart.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::CallSetup { .. } | Self::Protocol(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("room.min_password_length = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: room.min_password_length = 0"
        );
    }

    #[test]
    fn session_error_display_keeps_reason() {
        let err = SessionError::RoomIdConflict("r1-ab12cd".into());
        assert_eq!(err.to_string(), "room id already in use: r1-ab12cd");

        let err = SessionError::AuthFailure("Incorrect password".into());
        assert_eq!(err.to_string(), "authentication failed: Incorrect password");

        let err = SessionError::CallSetup {
            peer_id: "p2".into(),
            reason: "ice failed".into(),
        };
        assert_eq!(err.to_string(), "call to p2 failed: ice failed");
    }

    #[test]
    fn terminal_classification() {
        assert!(SessionError::RoomIdConflict("x".into()).is_terminal());
        assert!(SessionError::Signaling("down".into()).is_terminal());
        assert!(SessionError::AuthFailure("no".into()).is_terminal());
        assert!(SessionError::MediaAccess("denied".into()).is_terminal());
        assert!(SessionError::InvalidRequest("empty".into()).is_terminal());
        assert!(SessionError::Closed.is_terminal());

        assert!(!SessionError::Protocol("bad tag".into()).is_terminal());
        assert!(!SessionError::CallSetup {
            peer_id: "p".into(),
            reason: "r".into()
        }
        .is_terminal());
    }

    #[test]
    fn huddle_error_from_session() {
        let err: HuddleError = SessionError::Signaling("relay down".into()).into();
        assert!(matches!(err, HuddleError::Session(_)));
        assert!(err.to_string().contains("relay down"));
    }

    #[test]
    fn huddle_error_from_config() {
        let err: HuddleError = ConfigError::ParseError("bad toml".into()).into();
        assert!(matches!(err, HuddleError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn other_error_displays_message() {
        let err = HuddleError::Other("event printer failed".into());
        assert_eq!(err.to_string(), "event printer failed");
    }
}
