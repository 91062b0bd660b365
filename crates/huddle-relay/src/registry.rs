//! Peer registry: maps claimed ids to each connection's outbound queue.
//!
//! The registry also remembers which ids have exchanged signals, so the
//! ones left behind can be told when a peer goes away.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use huddle_common::new_id;

struct PeerEntry {
    tx: mpsc::Sender<String>,
    contacts: HashSet<String>,
}

/// Thread-safe id → sender map.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<String, PeerEntry>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `desired`, or a fresh UUID when `None`.
    /// Returns `Err(id)` if the id is already claimed.
    pub async fn register(
        &self,
        desired: Option<&str>,
        tx: mpsc::Sender<String>,
    ) -> Result<String, String> {
        let mut map = self.peers.write().await;
        let id = match desired {
            Some(id) if map.contains_key(id) => return Err(id.to_string()),
            Some(id) => id.to_string(),
            None => loop {
                let id = new_id();
                if !map.contains_key(&id) {
                    break id;
                }
            },
        };
        map.insert(
            id.clone(),
            PeerEntry {
                tx,
                contacts: HashSet::new(),
            },
        );
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Option<mpsc::Sender<String>> {
        self.peers.read().await.get(id).map(|entry| entry.tx.clone())
    }

    /// Look up `to` for a signal from `from`, remembering that the two have
    /// been in contact.
    pub async fn route(&self, from: &str, to: &str) -> Option<mpsc::Sender<String>> {
        let mut map = self.peers.write().await;
        let tx = map.get_mut(to).map(|entry| {
            entry.contacts.insert(from.to_string());
            entry.tx.clone()
        })?;
        if let Some(entry) = map.get_mut(from) {
            entry.contacts.insert(to.to_string());
        }
        Some(tx)
    }

    /// Release `id`. Returns the senders of every still-registered peer it
    /// was in contact with, or `None` if it was not registered.
    pub async fn unregister(&self, id: &str) -> Option<Vec<(String, mpsc::Sender<String>)>> {
        let mut map = self.peers.write().await;
        let entry = map.remove(id)?;
        let mut left_behind = Vec::new();
        for contact in entry.contacts {
            if let Some(other) = map.get_mut(&contact) {
                other.contacts.remove(id);
                left_behind.push((contact, other.tx.clone()));
            }
        }
        Some(left_behind)
    }

    pub async fn count(&self) -> usize {
        self.peers.read().await.len()
    }
}
