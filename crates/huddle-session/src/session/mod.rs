//! Room session coordinator.
//!
//! A [`Coordinator`] owns one participant's [`Session`]: it registers with
//! the relay, runs the join/participants handshake, and keeps one media call
//! per remote peer bound to a display slot. Progress is reported as
//! [`SessionEvent`]s; the UI drives it through a [`SessionHandle`].

mod coordinator;
mod fanout;
mod membership;
mod state;
mod types;

pub use coordinator::Coordinator;
pub use state::Session;
pub use types::{
    DisplaySlot, Phase, Role, RoomRequest, SessionCommand, SessionConfig, SessionEvent,
    SessionHandle, DEFAULT_PARTICIPANT_LABEL,
};
