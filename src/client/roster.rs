//! Client-side view of who is on the server.

use std::collections::BTreeMap;

/// Nicknames of connected peers keyed by their client id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    peers: BTreeMap<u8, String>,
}

impl Roster {
    /// Record `nickname` for `id`. Returns `true` if the entry is new or
    /// changed.
    pub fn insert(&mut self, id: u8, nickname: &str) -> bool {
        if self.peers.get(&id).is_some_and(|known| known == nickname) {
            return false;
        }
        self.peers.insert(id, nickname.to_owned());
        true
    }

    /// Forget `id`, returning its nickname.
    pub fn remove(&mut self, id: u8) -> Option<String> { self.peers.remove(&id) }

    /// Nickname of `id`.
    #[must_use]
    pub fn nickname(&self, id: u8) -> Option<&str> { self.peers.get(&id).map(String::as_str) }

    /// Id of the peer called `nickname`.
    #[must_use]
    pub fn id_of(&self, nickname: &str) -> Option<u8> {
        self.peers
            .iter()
            .find_map(|(id, known)| (known == nickname).then_some(*id))
    }

    /// Forget everyone.
    pub fn clear(&mut self) { self.peers.clear(); }

    /// Number of known peers.
    #[must_use]
    pub fn len(&self) -> usize { self.peers.len() }

    /// Returns `true` if no peer is known.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.peers.is_empty() }

    /// Snapshot as an ordered map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<u8, String> { self.peers.clone() }
}
