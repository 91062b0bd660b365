//! Local view of who is in the room.

use std::collections::HashMap;

/// One room member as known locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub peer_id: String,
    pub display_name: String,
}

/// Outcome of inserting a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    Added,
    Renamed,
    Unchanged,
}

/// Mapping from peer id to display name, kept in first-insertion order so
/// snapshots list the room creator first.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<Participant>,
    index: HashMap<String, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or rename a participant. Last write wins for the name.
    pub fn insert(&mut self, peer_id: &str, display_name: &str) -> RosterChange {
        match self.index.get(peer_id) {
            Some(&i) if self.entries[i].display_name == display_name => RosterChange::Unchanged,
            Some(&i) => {
                self.entries[i].display_name = display_name.to_string();
                RosterChange::Renamed
            }
            None => {
                self.index.insert(peer_id.to_string(), self.entries.len());
                self.entries.push(Participant {
                    peer_id: peer_id.to_string(),
                    display_name: display_name.to_string(),
                });
                RosterChange::Added
            }
        }
    }

    /// Merge a snapshot received from another participant.
    /// Returns true if anything changed.
    pub fn merge<'a, I>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        let mut changed = false;
        for (peer_id, display_name) in entries {
            if self.insert(peer_id, display_name) != RosterChange::Unchanged {
                changed = true;
            }
        }
        changed
    }

    pub fn get(&self, peer_id: &str) -> Option<&str> {
        self.index
            .get(peer_id)
            .map(|&i| self.entries[i].display_name.as_str())
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.index.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.entries
    }

    /// Ordered `(peer_id, display_name)` pairs for a `participants` message.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|p| (p.peer_id.clone(), p.display_name.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
