//! Bookkeeping between local handles and wire ids.
//!
//! Wire ids are chosen by whichever side initiated the connection or call,
//! so inbound ids are only unique per remote peer and are indexed by
//! `(peer_id, wire_id)`.

use std::collections::HashMap;

use huddle_common::{new_id, StreamDescriptor};

use crate::transport::{CallId, ConnectionId};

#[derive(Debug, Clone)]
pub(crate) struct ConnEntry {
    pub(crate) peer: String,
    pub(crate) wire_id: String,
    pub(crate) open: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CallEntry {
    pub(crate) peer: String,
    pub(crate) wire_id: String,
    pub(crate) outbound: bool,
    pub(crate) answered: bool,
    /// Caller's stream on an inbound call, handed over when we answer.
    pub(crate) offered: Option<StreamDescriptor>,
}

type WireKey = (String, String);

#[derive(Debug, Default)]
pub(crate) struct LinkTable {
    next_id: u64,
    conns: HashMap<ConnectionId, ConnEntry>,
    conn_index: HashMap<WireKey, ConnectionId>,
    calls: HashMap<CallId, CallEntry>,
    call_index: HashMap<WireKey, CallId>,
}

impl LinkTable {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // -- connections --

    pub(crate) fn add_outbound_conn(&mut self, peer: &str) -> (ConnectionId, String) {
        let conn = ConnectionId(self.next());
        let wire_id = new_id();
        self.insert_conn(conn, peer, &wire_id, false);
        (conn, wire_id)
    }

    /// Register a connection the remote side opened. It is open immediately.
    pub(crate) fn add_inbound_conn(&mut self, peer: &str, wire_id: &str) -> ConnectionId {
        if let Some(&existing) = self.conn_index.get(&(peer.to_string(), wire_id.to_string())) {
            return existing;
        }
        let conn = ConnectionId(self.next());
        self.insert_conn(conn, peer, wire_id, true);
        conn
    }

    fn insert_conn(&mut self, conn: ConnectionId, peer: &str, wire_id: &str, open: bool) {
        self.conn_index
            .insert((peer.to_string(), wire_id.to_string()), conn);
        self.conns.insert(
            conn,
            ConnEntry {
                peer: peer.to_string(),
                wire_id: wire_id.to_string(),
                open,
            },
        );
    }

    pub(crate) fn conn(&self, conn: ConnectionId) -> Option<&ConnEntry> {
        self.conns.get(&conn)
    }

    pub(crate) fn conn_by_wire(&self, peer: &str, wire_id: &str) -> Option<ConnectionId> {
        self.conn_index
            .get(&(peer.to_string(), wire_id.to_string()))
            .copied()
    }

    /// Mark an outbound connection accepted. Returns false if it was
    /// unknown or already open.
    pub(crate) fn mark_open(&mut self, conn: ConnectionId) -> bool {
        match self.conns.get_mut(&conn) {
            Some(entry) if !entry.open => {
                entry.open = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove_conn(&mut self, conn: ConnectionId) -> Option<ConnEntry> {
        let entry = self.conns.remove(&conn)?;
        self.conn_index
            .remove(&(entry.peer.clone(), entry.wire_id.clone()));
        Some(entry)
    }

    // -- calls --

    pub(crate) fn add_outbound_call(&mut self, peer: &str) -> (CallId, String) {
        let call = CallId(self.next());
        let wire_id = new_id();
        self.insert_call(
            call,
            CallEntry {
                peer: peer.to_string(),
                wire_id: wire_id.clone(),
                outbound: true,
                answered: false,
                offered: None,
            },
        );
        (call, wire_id)
    }

    pub(crate) fn add_inbound_call(
        &mut self,
        peer: &str,
        wire_id: &str,
        offered: StreamDescriptor,
    ) -> Option<CallId> {
        if self
            .call_index
            .contains_key(&(peer.to_string(), wire_id.to_string()))
        {
            return None;
        }
        let call = CallId(self.next());
        self.insert_call(
            call,
            CallEntry {
                peer: peer.to_string(),
                wire_id: wire_id.to_string(),
                outbound: false,
                answered: false,
                offered: Some(offered),
            },
        );
        Some(call)
    }

    fn insert_call(&mut self, call: CallId, entry: CallEntry) {
        self.call_index
            .insert((entry.peer.clone(), entry.wire_id.clone()), call);
        self.calls.insert(call, entry);
    }

    pub(crate) fn call_by_wire(&self, peer: &str, wire_id: &str) -> Option<CallId> {
        self.call_index
            .get(&(peer.to_string(), wire_id.to_string()))
            .copied()
    }

    /// Take the caller's stream from a ringing inbound call and mark it
    /// answered. Returns the peer, wire id and offered stream.
    pub(crate) fn answer_inbound(
        &mut self,
        call: CallId,
    ) -> Option<(String, String, StreamDescriptor)> {
        let entry = self.calls.get_mut(&call)?;
        if entry.outbound || entry.answered {
            return None;
        }
        let offered = entry.offered.take()?;
        entry.answered = true;
        Some((entry.peer.clone(), entry.wire_id.clone(), offered))
    }

    /// Mark an outbound call answered by the remote side.
    pub(crate) fn mark_answered(&mut self, call: CallId) -> bool {
        match self.calls.get_mut(&call) {
            Some(entry) if entry.outbound && !entry.answered => {
                entry.answered = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove_call(&mut self, call: CallId) -> Option<CallEntry> {
        let entry = self.calls.remove(&call)?;
        self.call_index
            .remove(&(entry.peer.clone(), entry.wire_id.clone()));
        Some(entry)
    }

    // -- bulk --

    /// Drop every link still waiting on `peer`: outbound connections not yet
    /// accepted and outbound calls not yet answered.
    pub(crate) fn fail_pending(&mut self, peer: &str) -> (Vec<ConnectionId>, Vec<CallId>) {
        let conns: Vec<ConnectionId> = self
            .conns
            .iter()
            .filter(|(_, e)| e.peer == peer && !e.open)
            .map(|(c, _)| *c)
            .collect();
        let calls: Vec<CallId> = self
            .calls
            .iter()
            .filter(|(_, e)| e.peer == peer && e.outbound && !e.answered)
            .map(|(c, _)| *c)
            .collect();
        for conn in &conns {
            self.remove_conn(*conn);
        }
        for call in &calls {
            self.remove_call(*call);
        }
        (conns, calls)
    }

    /// Drop every link with `peer`, whatever its state.
    pub(crate) fn remove_peer(&mut self, peer: &str) -> (Vec<ConnectionId>, Vec<CallId>) {
        let conns: Vec<ConnectionId> = self
            .conns
            .iter()
            .filter(|(_, e)| e.peer == peer)
            .map(|(c, _)| *c)
            .collect();
        let calls: Vec<CallId> = self
            .calls
            .iter()
            .filter(|(_, e)| e.peer == peer)
            .map(|(c, _)| *c)
            .collect();
        for conn in &conns {
            self.remove_conn(*conn);
        }
        for call in &calls {
            self.remove_call(*call);
        }
        (conns, calls)
    }

    /// Remove every link, returning them for teardown.
    pub(crate) fn drain(&mut self) -> (Vec<ConnEntry>, Vec<CallEntry>) {
        self.conn_index.clear();
        self.call_index.clear();
        (
            self.conns.drain().map(|(_, e)| e).collect(),
            self.calls.drain().map(|(_, e)| e).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_ids_are_scoped_per_peer() {
        let mut links = LinkTable::default();
        let a = links.add_inbound_conn("alice", "c1");
        let b = links.add_inbound_conn("bob", "c1");
        assert_ne!(a, b);
        assert_eq!(links.conn_by_wire("alice", "c1"), Some(a));
        assert_eq!(links.conn_by_wire("bob", "c1"), Some(b));
        // Repeated connect frames map to the same handle.
        assert_eq!(links.add_inbound_conn("alice", "c1"), a);
    }

    #[test]
    fn outbound_conn_opens_once() {
        let mut links = LinkTable::default();
        let (conn, wire) = links.add_outbound_conn("room");
        assert!(!links.conn(conn).unwrap().open);
        assert_eq!(links.conn_by_wire("room", &wire), Some(conn));
        assert!(links.mark_open(conn));
        assert!(!links.mark_open(conn));
    }

    #[test]
    fn answer_takes_offer_once() {
        let mut links = LinkTable::default();
        let offer = StreamDescriptor {
            has_audio: true,
            audio_enabled: true,
            ..Default::default()
        };
        let call = links.add_inbound_call("alice", "k1", offer).unwrap();
        assert!(links.add_inbound_call("alice", "k1", offer).is_none());

        let (peer, wire, offered) = links.answer_inbound(call).unwrap();
        assert_eq!(peer, "alice");
        assert_eq!(wire, "k1");
        assert_eq!(offered, offer);
        assert!(links.answer_inbound(call).is_none());
    }

    #[test]
    fn fail_pending_only_touches_waiting_links() {
        let mut links = LinkTable::default();
        let (waiting, _) = links.add_outbound_conn("gone");
        let (open, _) = links.add_outbound_conn("gone");
        links.mark_open(open);
        let (ringing, _) = links.add_outbound_call("gone");
        let (other, other_wire) = links.add_outbound_call("alive");

        let (conns, calls) = links.fail_pending("gone");
        assert_eq!(conns, vec![waiting]);
        assert_eq!(calls, vec![ringing]);
        assert!(links.conn(open).is_some());
        assert_eq!(links.call_by_wire("alive", &other_wire), Some(other));
    }

    #[test]
    fn drain_empties_table() {
        let mut links = LinkTable::default();
        links.add_outbound_conn("a");
        links.add_outbound_call("b");
        let (conns, calls) = links.drain();
        assert_eq!(conns.len(), 1);
        assert_eq!(calls.len(), 1);
        assert!(links.fail_pending("a").0.is_empty());
    }

    #[test]
    fn remove_peer_takes_open_and_pending_links() {
        let mut links = LinkTable::default();
        let inbound = links.add_inbound_conn("gone", "c1");
        let (ringing, _) = links.add_outbound_call("gone");
        let (kept, _) = links.add_outbound_call("alive");

        let (conns, calls) = links.remove_peer("gone");
        assert_eq!(conns, vec![inbound]);
        assert_eq!(calls, vec![ringing]);
        assert!(links.conn_by_wire("gone", "c1").is_none());
        assert_eq!(links.remove_peer("alive").1, vec![kept]);
    }
}
