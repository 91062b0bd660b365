//! Capture device capability and the acquisition policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{info, warn};

use huddle_common::{new_id, SessionError};

use super::stream::{LocalMediaStream, MediaTrack, TrackKind};

/// A capture device reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

/// Which kinds of tracks to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub const AUDIO_ONLY: Self = Self {
        video: false,
        audio: true,
    };
}

/// Access to local capture devices.
///
/// `open` may suspend on a permission prompt; callers must tolerate other
/// events arriving meanwhile.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn devices(&self) -> Vec<DeviceInfo>;

    async fn open(&self, constraints: MediaConstraints) -> Result<LocalMediaStream, SessionError>;

    /// Capture the screen as a video track.
    async fn open_display(&self) -> Result<MediaTrack, SessionError> {
        Err(SessionError::MediaAccess(
            "screen capture is not supported".into(),
        ))
    }
}

/// Result of [`acquire_local_stream`].
#[derive(Debug)]
pub struct AcquiredMedia {
    pub stream: LocalMediaStream,
    /// Set when the full request failed and the audio-only retry succeeded.
    pub fallback_reason: Option<String>,
}

/// Acquire the local stream.
///
/// Requests video iff a camera is present and audio iff a microphone is
/// present. If that fails, retries once with audio only; a second failure
/// is terminal.
pub async fn acquire_local_stream(source: &dyn MediaSource) -> Result<AcquiredMedia, SessionError> {
    let devices = source.devices().await;
    let constraints = MediaConstraints {
        video: devices.iter().any(|d| d.kind == TrackKind::Video),
        audio: devices.iter().any(|d| d.kind == TrackKind::Audio),
    };
    info!(
        video = constraints.video,
        audio = constraints.audio,
        "requesting local media"
    );

    if !constraints.video && !constraints.audio {
        return Err(SessionError::MediaAccess(
            "no microphone or camera found; connect at least a microphone to join".into(),
        ));
    }

    match source.open(constraints).await {
        Ok(stream) => Ok(AcquiredMedia {
            stream,
            fallback_reason: None,
        }),
        Err(first) => {
            warn!(error = %first, "media request failed, retrying audio only");
            match source.open(MediaConstraints::AUDIO_ONLY).await {
                Ok(stream) => Ok(AcquiredMedia {
                    stream,
                    fallback_reason: Some(first.to_string()),
                }),
                Err(second) => Err(SessionError::MediaAccess(format!(
                    "{second} (after: {first})"
                ))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceSet
// ---------------------------------------------------------------------------

/// A fixed set of capture devices.
///
/// Backs headless participants and tests. Every track it hands out shares a
/// liveness flag with the set, so callers can check that devices were
/// released.
#[derive(Debug, Default)]
pub struct DeviceSet {
    camera: bool,
    microphone: bool,
    deny_camera: bool,
    start_video_muted: bool,
    start_audio_muted: bool,
    display: bool,
    issued: Mutex<Vec<Arc<AtomicBool>>>,
}

impl DeviceSet {
    pub fn new(camera: bool, microphone: bool) -> Self {
        Self {
            camera,
            microphone,
            ..Default::default()
        }
    }

    /// Simulate the user refusing camera permission.
    pub fn deny_camera(mut self, deny: bool) -> Self {
        self.deny_camera = deny;
        self
    }

    pub fn start_muted(mut self, video: bool, audio: bool) -> Self {
        self.start_video_muted = video;
        self.start_audio_muted = audio;
        self
    }

    /// Allow screen capture.
    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    /// Number of handed-out tracks that have not been stopped.
    pub fn live_tracks(&self) -> usize {
        self.issued
            .lock()
            .map(|issued| issued.iter().filter(|l| l.load(Ordering::SeqCst)).count())
            .unwrap_or(0)
    }

    fn issue(&self, kind: TrackKind, label: &str) -> MediaTrack {
        let live = Arc::new(AtomicBool::new(true));
        if let Ok(mut issued) = self.issued.lock() {
            issued.push(Arc::clone(&live));
        }
        MediaTrack::new(new_id(), kind, label.to_string(), live)
    }
}

#[async_trait]
impl MediaSource for DeviceSet {
    async fn devices(&self) -> Vec<DeviceInfo> {
        let mut devices = Vec::new();
        if self.camera {
            devices.push(DeviceInfo {
                id: "camera-0".into(),
                kind: TrackKind::Video,
                label: "Camera".into(),
            });
        }
        if self.microphone {
            devices.push(DeviceInfo {
                id: "microphone-0".into(),
                kind: TrackKind::Audio,
                label: "Microphone".into(),
            });
        }
        devices
    }

    async fn open(&self, constraints: MediaConstraints) -> Result<LocalMediaStream, SessionError> {
        if constraints.video && !self.camera {
            return Err(SessionError::MediaAccess("camera not found".into()));
        }
        if constraints.video && self.deny_camera {
            return Err(SessionError::MediaAccess("camera permission denied".into()));
        }
        if constraints.audio && !self.microphone {
            return Err(SessionError::MediaAccess("microphone not found".into()));
        }

        let mut tracks = Vec::new();
        if constraints.video {
            let mut track = self.issue(TrackKind::Video, "Camera");
            track.set_enabled(!self.start_video_muted);
            tracks.push(track);
        }
        if constraints.audio {
            let mut track = self.issue(TrackKind::Audio, "Microphone");
            track.set_enabled(!self.start_audio_muted);
            tracks.push(track);
        }
        Ok(LocalMediaStream::from_tracks(tracks))
    }

    async fn open_display(&self) -> Result<MediaTrack, SessionError> {
        if !self.display {
            return Err(SessionError::MediaAccess("screen capture unavailable".into()));
        }
        Ok(self.issue(TrackKind::Video, "Screen"))
    }
}
