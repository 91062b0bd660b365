//! Tracks and the session-owned local stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use huddle_common::StreamDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// A capture track. Stopping it releases the underlying device; a stopped
/// track cannot be re-enabled.
#[derive(Debug)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    enabled: bool,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(id: String, kind: TrackKind, label: String, live: Arc<AtomicBool>) -> Self {
        Self {
            id,
            kind,
            label,
            enabled: true,
            live,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.is_live();
    }

    pub fn stop(&mut self) {
        self.enabled = false;
        self.live.store(false, Ordering::SeqCst);
    }
}

/// The local stream owned by a session: at most one video and one audio
/// track.
///
/// While the screen is shared, the display track is the video track and the
/// camera track is parked, still live, until sharing stops.
#[derive(Debug, Default)]
pub struct LocalMediaStream {
    tracks: Vec<MediaTrack>,
    parked_camera: Option<MediaTrack>,
    sharing: bool,
}

impl LocalMediaStream {
    /// Build a stream, keeping only the first track of each kind.
    pub fn from_tracks(tracks: impl IntoIterator<Item = MediaTrack>) -> Self {
        let mut kept: Vec<MediaTrack> = Vec::new();
        for mut track in tracks {
            if kept.iter().any(|t| t.kind == track.kind) {
                track.stop();
                continue;
            }
            kept.push(track);
        }
        Self {
            tracks: kept,
            ..Default::default()
        }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn has_video(&self) -> bool {
        self.track(TrackKind::Video).is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.track(TrackKind::Audio).is_some()
    }

    /// Flip the `enabled` flag of the track of `kind`.
    /// Returns the new state, or `None` when there is no such track.
    pub fn toggle(&mut self, kind: TrackKind) -> Option<bool> {
        let track = self.tracks.iter_mut().find(|t| t.kind == kind)?;
        let next = !track.enabled;
        track.set_enabled(next);
        Some(track.enabled)
    }

    pub fn is_sharing_screen(&self) -> bool {
        self.sharing
    }

    /// Show `screen` in place of the camera. Returns false, and releases
    /// `screen`, if a share is already running.
    pub fn start_screen_share(&mut self, mut screen: MediaTrack) -> bool {
        if self.sharing {
            screen.stop();
            return false;
        }
        if let Some(i) = self.tracks.iter().position(|t| t.kind == TrackKind::Video) {
            self.parked_camera = Some(self.tracks.remove(i));
        }
        self.tracks.push(screen);
        self.sharing = true;
        true
    }

    /// Stop the display track and bring the camera back, if there was one.
    /// Returns false when nothing was being shared.
    pub fn stop_screen_share(&mut self) -> bool {
        if !self.sharing {
            return false;
        }
        if let Some(i) = self.tracks.iter().position(|t| t.kind == TrackKind::Video) {
            self.tracks.remove(i).stop();
        }
        if let Some(camera) = self.parked_camera.take() {
            self.tracks.push(camera);
        }
        self.sharing = false;
        true
    }

    pub fn stop_all(&mut self) {
        for track in self.tracks.iter_mut().chain(self.parked_camera.as_mut()) {
            track.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks
            .iter()
            .chain(self.parked_camera.as_ref())
            .all(|t| !t.is_live())
    }

    /// What a remote peer sees when we call or answer with this stream.
    pub fn descriptor(&self) -> StreamDescriptor {
        let video = self.track(TrackKind::Video);
        let audio = self.track(TrackKind::Audio);
        StreamDescriptor {
            has_video: video.is_some(),
            video_enabled: video.is_some_and(|t| t.enabled()),
            has_audio: audio.is_some(),
            audio_enabled: audio.is_some_and(|t| t.enabled()),
        }
    }
}
