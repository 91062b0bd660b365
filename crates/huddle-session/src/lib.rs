pub mod media;
pub mod protocol;
pub mod roster;
pub mod session;
pub mod transport;

pub use media::{
    acquire_local_stream, AcquiredMedia, DeviceSet, LocalMediaStream, MediaSource, TrackKind,
};
pub use protocol::RoomMessage;
pub use roster::{Participant, Roster, RosterChange};
pub use session::{
    Coordinator, DisplaySlot, Phase, Role, RoomRequest, Session, SessionConfig, SessionEvent,
    SessionHandle,
};
pub use transport::{
    MemoryRelay, MemoryTransport, SignalingTransport, TransportEvents, WsConfig, WsTransport,
};
