//! Local capture device settings.

use serde::{Deserialize, Serialize};

/// Describes the capture devices the participant exposes to the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Whether a camera is attached.
    pub camera: bool,
    /// Whether a microphone is attached.
    pub microphone: bool,
    /// Simulate the user denying camera access (forces the audio-only fallback).
    pub deny_camera: bool,
    /// Start with the camera track disabled.
    pub start_video_muted: bool,
    /// Start with the microphone track disabled.
    pub start_audio_muted: bool,
    /// Whether screen capture is available for sharing.
    pub screen_capture: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            camera: true,
            microphone: true,
            deny_camera: false,
            start_video_muted: false,
            start_audio_muted: false,
            screen_capture: true,
        }
    }
}
