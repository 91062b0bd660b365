pub mod errors;
pub mod id;
pub mod wire;

pub use errors::{ConfigError, HuddleError, SessionError};
pub use id::{new_id, RoomIdGenerator, TimestampRoomIds};
pub use wire::{ClientFrame, RelayFrame, SignalPayload, StreamDescriptor};

pub type Result<T> = std::result::Result<T, HuddleError>;
