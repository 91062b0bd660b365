//! Local capture: tracks, the owned local stream, and the device capability
//! used to acquire it.
//!
//! Media bytes never flow through this crate. A track is a handle with an
//! `enabled` flag and a liveness flag shared with the device that produced
//! it; calls only exchange the resulting `StreamDescriptor`.

mod source;
mod stream;

pub use source::{
    acquire_local_stream, AcquiredMedia, DeviceInfo, DeviceSet, MediaConstraints, MediaSource,
};
pub use stream::{LocalMediaStream, MediaTrack, TrackKind};
