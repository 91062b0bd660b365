//! Per-participant session state, owned by the coordinator.

use std::collections::{BTreeMap, HashMap};

use huddle_common::{SessionError, StreamDescriptor};

use crate::media::LocalMediaStream;
use crate::roster::Roster;
use crate::transport::{CallId, ConnectionId};

use super::types::{DisplaySlot, Phase, Role, RoomRequest};

/// Remote end of a data connection.
#[derive(Debug, Clone)]
pub(crate) struct PeerLink {
    pub(crate) peer_id: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveCall {
    pub(crate) peer_id: String,
    pub(crate) outbound: bool,
}

/// Inbound call waiting for local media.
#[derive(Debug, Clone)]
pub(crate) struct QueuedCall {
    pub(crate) call: CallId,
    pub(crate) peer_id: String,
    pub(crate) offered: StreamDescriptor,
}

#[derive(Debug)]
pub struct Session {
    pub(crate) request: RoomRequest,
    self_id: Option<String>,
    pub(crate) phase: Phase,
    pub(crate) roster: Roster,
    pub(crate) media: Option<LocalMediaStream>,
    pub(crate) connections: HashMap<ConnectionId, PeerLink>,
    pub(crate) calls: HashMap<CallId, ActiveCall>,
    pub(crate) slots: BTreeMap<String, DisplaySlot>,
    /// Joiner's connection to the room creator.
    pub(crate) room_conn: Option<ConnectionId>,
    /// Joiner has received a participants snapshot.
    pub(crate) admitted: bool,
    /// Peers admitted before local media was ready.
    pub(crate) deferred_calls: Vec<String>,
    pub(crate) queued_calls: Vec<QueuedCall>,
}

impl Session {
    pub(crate) fn new(request: RoomRequest) -> Self {
        Self {
            request,
            self_id: None,
            phase: Phase::Idle,
            roster: Roster::new(),
            media: None,
            connections: HashMap::new(),
            calls: HashMap::new(),
            slots: BTreeMap::new(),
            room_conn: None,
            admitted: false,
            deferred_calls: Vec::new(),
            queued_calls: Vec::new(),
        }
    }

    /// Record the relay-issued identity. It can only be set once.
    pub(crate) fn set_self_id(&mut self, id: &str) -> Result<(), SessionError> {
        if let Some(existing) = &self.self_id {
            return Err(SessionError::InvalidRequest(format!(
                "self id already assigned: {existing}"
            )));
        }
        self.self_id = Some(id.to_string());
        Ok(())
    }

    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    pub fn room_id(&self) -> &str {
        self.request.room_id()
    }

    pub fn display_name(&self) -> &str {
        self.request.display_name()
    }

    pub fn role(&self) -> Role {
        self.request.role()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn media(&self) -> Option<&LocalMediaStream> {
        self.media.as_ref()
    }

    /// Descriptor of the local stream, once media is available.
    pub fn local_stream(&self) -> Option<StreamDescriptor> {
        self.media.as_ref().map(LocalMediaStream::descriptor)
    }

    pub fn slot(&self, peer_id: &str) -> Option<&DisplaySlot> {
        self.slots.get(peer_id)
    }

    pub fn slots(&self) -> impl Iterator<Item = &DisplaySlot> {
        self.slots.values()
    }

    /// Live calls with `peer_id`.
    pub fn calls_with(&self, peer_id: &str) -> usize {
        self.calls.values().filter(|c| c.peer_id == peer_id).count()
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether a call with `peer_id` is live, queued, or deferred.
    pub(crate) fn has_call_with(&self, peer_id: &str) -> bool {
        self.calls.values().any(|c| c.peer_id == peer_id)
            || self.queued_calls.iter().any(|q| q.peer_id == peer_id)
            || self.deferred_calls.iter().any(|p| p == peer_id)
    }

    /// Drop everything except the request and identity.
    pub(crate) fn clear(&mut self) {
        self.roster.clear();
        self.connections.clear();
        self.calls.clear();
        self.slots.clear();
        self.room_conn = None;
        self.deferred_calls.clear();
        self.queued_calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_id_set_once() {
        let mut session = Session::new(RoomRequest::join("r1", "Bob", "pass"));
        assert!(session.set_self_id("p2").is_ok());
        assert!(matches!(
            session.set_self_id("p3"),
            Err(SessionError::InvalidRequest(_))
        ));
        assert_eq!(session.self_id(), Some("p2"));
    }

    #[test]
    fn call_tracking_covers_queued_and_deferred() {
        let mut session = Session::new(RoomRequest::create_with_id("r1", "Alice", "pass"));
        assert!(!session.has_call_with("p2"));

        session.deferred_calls.push("p2".into());
        assert!(session.has_call_with("p2"));

        session.queued_calls.push(QueuedCall {
            call: CallId(7),
            peer_id: "p3".into(),
            offered: StreamDescriptor::default(),
        });
        assert!(session.has_call_with("p3"));

        session.calls.insert(
            CallId(8),
            ActiveCall {
                peer_id: "p4".into(),
                outbound: true,
            },
        );
        assert!(session.has_call_with("p4"));
        assert_eq!(session.calls_with("p4"), 1);

        session.clear();
        assert!(!session.has_call_with("p2"));
        assert_eq!(session.call_count(), 0);
    }
}
