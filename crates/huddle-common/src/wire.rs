//! Relay-level wire protocol shared by the relay server and the WebSocket
//! transport. The relay only parses the outer frame; `SignalPayload`s are
//! forwarded between peers untouched.

use serde::{Deserialize, Serialize};

/// Frames a participant sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Claim `desired_id`, or ask the relay to assign one.
    Register {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desired_id: Option<String>,
    },
    /// Forward `payload` to the participant registered as `to`.
    Signal { to: String, payload: SignalPayload },
    /// Release our id and close.
    Unregister,
}

/// Frames the relay sends to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Registered { id: String },
    IdTaken { id: String },
    PeerUnavailable { peer_id: String },
    /// A peer we exchanged signals with has left the relay.
    PeerLeft { peer_id: String },
    Signal { from: String, payload: SignalPayload },
    Error { message: String },
}

/// Peer-to-peer signaling carried inside `Signal` frames.
///
/// Connection and call ids are random UUIDs chosen by the initiating side;
/// receivers key them by `(from, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPayload {
    Connect { conn_id: String },
    /// The receiver accepted a `Connect`; the channel is open on both ends.
    ConnectAck { conn_id: String },
    Data { conn_id: String, data: String },
    CloseConnection { conn_id: String },
    Call { call_id: String, stream: StreamDescriptor },
    Answer { call_id: String, stream: StreamDescriptor },
    HangUp { call_id: String },
}

/// Shape of a media stream as seen by the remote side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub has_video: bool,
    pub video_enabled: bool,
    pub has_audio: bool,
    pub audio_enabled: bool,
}

impl StreamDescriptor {
    /// Whether a live picture can be shown for this stream.
    pub fn shows_video(&self) -> bool {
        self.has_video && self.video_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_without_id_omits_field() {
        let json = serde_json::to_string(&ClientFrame::Register { desired_id: None }).unwrap();
        assert_eq!(json, r#"{"type":"register"}"#);

        let parsed: ClientFrame = serde_json::from_str(r#"{"type":"register"}"#).unwrap();
        assert_eq!(parsed, ClientFrame::Register { desired_id: None });
    }

    #[test]
    fn signal_frame_nests_kind_tag() {
        let frame = ClientFrame::Signal {
            to: "room-1".into(),
            payload: SignalPayload::Connect {
                conn_id: "c-7".into(),
            },
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "signal");
        assert_eq!(value["to"], "room-1");
        assert_eq!(value["payload"]["kind"], "connect");
        assert_eq!(value["payload"]["conn_id"], "c-7");
    }

    #[test]
    fn relay_frames_parse() {
        let frame: RelayFrame =
            serde_json::from_str(r#"{"type":"id_taken","id":"r1-ab12cd"}"#).unwrap();
        assert_eq!(
            frame,
            RelayFrame::IdTaken {
                id: "r1-ab12cd".into()
            }
        );

        let frame: RelayFrame =
            serde_json::from_str(r#"{"type":"peer_unavailable","peer_id":"gone"}"#).unwrap();
        assert!(matches!(frame, RelayFrame::PeerUnavailable { ref peer_id } if peer_id == "gone"));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let result = serde_json::from_str::<RelayFrame>(r#"{"type":"mystery"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn stream_descriptor_video_visibility() {
        let audio_only = StreamDescriptor {
            has_audio: true,
            audio_enabled: true,
            ..Default::default()
        };
        assert!(!audio_only.shows_video());

        let camera_off = StreamDescriptor {
            has_video: true,
            video_enabled: false,
            ..audio_only
        };
        assert!(!camera_off.shows_video());

        let camera_on = StreamDescriptor {
            video_enabled: true,
            ..camera_off
        };
        assert!(camera_on.shows_video());
    }
}
