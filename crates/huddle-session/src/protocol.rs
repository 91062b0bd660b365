//! Room handshake messages exchanged over a peer connection.
//!
//! Field names follow the JSON wire format used by every participant:
//! `{"type":"join","peerId":..,"username":..,"password":..}`,
//! `{"type":"participants","participants":[[id,name],..]}` and
//! `{"type":"error","message":..}`.

use serde::{Deserialize, Serialize};

use huddle_common::SessionError;

/// Reply text sent when a join carries the wrong password.
pub const INCORRECT_PASSWORD: &str = "Incorrect password";

const KNOWN_TYPES: [&str; 3] = ["join", "participants", "error"];

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomMessage {
    /// Sent by a newcomer to the room creator once the connection is open.
    Join {
        #[serde(rename = "peerId")]
        peer_id: String,
        username: String,
        password: String,
    },
    /// Full roster snapshot as ordered `(peer_id, display_name)` pairs.
    Participants { participants: Vec<(String, String)> },
    Error { message: String },
}

impl std::fmt::Debug for RoomMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join {
                peer_id, username, ..
            } => f
                .debug_struct("Join")
                .field("peer_id", peer_id)
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Participants { participants } => f
                .debug_struct("Participants")
                .field("participants", participants)
                .finish(),
            Self::Error { message } => f.debug_struct("Error").field("message", message).finish(),
        }
    }
}

impl RoomMessage {
    pub fn incorrect_password() -> Self {
        Self::Error {
            message: INCORRECT_PASSWORD.to_string(),
        }
    }

    pub fn encode(&self) -> String {
        // Every variant is plain strings, so serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a message, separating unknown `type` tags from malformed bodies.
    pub fn decode(text: &str) -> Result<Self, SessionError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SessionError::Protocol(format!("invalid JSON: {e}")))?;

        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| SessionError::Protocol("message has no type tag".into()))?;

        if !KNOWN_TYPES.contains(&tag.as_str()) {
            return Err(SessionError::Protocol(format!("unknown message type: {tag}")));
        }

        serde_json::from_value(value)
            .map_err(|e| SessionError::Protocol(format!("malformed {tag} message: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_uses_camel_case_peer_id() {
        let msg = RoomMessage::Join {
            peer_id: "p2".into(),
            username: "Bob".into(),
            password: "pass".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.encode()).unwrap();
        assert_eq!(value["type"], "join");
        assert_eq!(value["peerId"], "p2");
        assert_eq!(value["username"], "Bob");
        assert_eq!(value["password"], "pass");
    }

    #[test]
    fn participants_encode_as_pairs() {
        let msg = RoomMessage::Participants {
            participants: vec![
                ("r1-ab12cd".into(), "Alice".into()),
                ("p2".into(), "Bob".into()),
            ],
        };
        assert_eq!(
            msg.encode(),
            r#"{"type":"participants","participants":[["r1-ab12cd","Alice"],["p2","Bob"]]}"#
        );
    }

    #[test]
    fn decodes_error_reply() {
        let msg = RoomMessage::decode(r#"{"type":"error","message":"Incorrect password"}"#).unwrap();
        assert_eq!(msg, RoomMessage::incorrect_password());
    }

    #[test]
    fn unknown_type_is_protocol_error() {
        let err = RoomMessage::decode(r#"{"type":"kick","peerId":"p2"}"#).unwrap_err();
        assert_eq!(
            err,
            SessionError::Protocol("unknown message type: kick".into())
        );
    }

    #[test]
    fn missing_type_is_protocol_error() {
        let err = RoomMessage::decode(r#"{"peerId":"p2"}"#).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
    }

    #[test]
    fn malformed_known_type_is_protocol_error() {
        let err = RoomMessage::decode(r#"{"type":"join","peerId":"p2"}"#).unwrap_err();
        match err {
            SessionError::Protocol(reason) => assert!(reason.starts_with("malformed join")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_protocol_error() {
        assert!(matches!(
            RoomMessage::decode("{not json"),
            Err(SessionError::Protocol(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let msg = RoomMessage::Join {
            peer_id: "p2".into(),
            username: "Bob".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{msg:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
