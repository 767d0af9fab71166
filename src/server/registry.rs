//! Registry of connected clients keyed by their small wire id.
//!
//! Client ids are the `u8` values carried in `from_id`/`to_id`. Id `0` belongs
//! to the server, so clients receive the smallest free id in `1..=255`. Each
//! entry owns its [`Session`]; removing the entry on disconnect is what lets
//! the session be dropped.

use std::{collections::BTreeMap, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    message::SERVER_ID,
    session::{Session, SessionId},
};

/// Longest nickname the server stores, in characters.
pub const MAX_NICKNAME_CHARS: usize = 32;

struct Client {
    session: Arc<Session>,
    nickname: Option<String>,
}

#[derive(Default)]
pub(crate) struct Registry {
    clients: DashMap<u8, Client>,
    by_session: DashMap<SessionId, u8>,
}

impl Registry {
    /// Admit `session` under the smallest free client id.
    ///
    /// Returns `None` once all 255 ids are taken.
    pub(crate) fn insert(&self, session: Arc<Session>) -> Option<u8> {
        let session_id = session.id();
        for id in (SERVER_ID + 1)..=u8::MAX {
            if let Entry::Vacant(slot) = self.clients.entry(id) {
                slot.insert(Client {
                    session,
                    nickname: None,
                });
                self.by_session.insert(session_id, id);
                return Some(id);
            }
        }
        None
    }

    /// Remove the client bound to `session_id`, returning its id and nickname.
    pub(crate) fn remove(&self, session_id: SessionId) -> Option<(u8, Option<String>)> {
        let (_, id) = self.by_session.remove(&session_id)?;
        let (_, client) = self.clients.remove(&id)?;
        Some((id, client.nickname))
    }

    pub(crate) fn id_of(&self, session_id: SessionId) -> Option<u8> {
        self.by_session.get(&session_id).map(|id| *id)
    }

    pub(crate) fn session(&self, id: u8) -> Option<Arc<Session>> {
        self.clients
            .get(&id)
            .map(|client| Arc::clone(&client.session))
    }

    pub(crate) fn nickname(&self, id: u8) -> Option<String> {
        self.clients
            .get(&id)
            .and_then(|client| client.nickname.clone())
    }

    /// Store a cleaned-up, unique version of `requested` for client `id`.
    ///
    /// Returns the stored nickname, or `None` if `id` is not registered.
    /// Callers must serialise assignments so uniqueness checks do not race.
    pub(crate) fn assign_nickname(&self, id: u8, requested: &str) -> Option<String> {
        if !self.clients.contains_key(&id) {
            return None;
        }
        let nickname = normalize_nickname(requested, id, |candidate| {
            self.clients.iter().any(|client| {
                *client.key() != id && client.nickname.as_deref() == Some(candidate)
            })
        });
        let mut client = self.clients.get_mut(&id)?;
        client.nickname = Some(nickname.clone());
        Some(nickname)
    }

    /// Snapshot of sessions, skipping `except`.
    ///
    /// Collected up front so no map shard stays locked while sending.
    pub(crate) fn sessions_except(&self, except: Option<u8>) -> Vec<(u8, Arc<Session>)> {
        self.clients
            .iter()
            .filter(|client| Some(*client.key()) != except)
            .map(|client| (*client.key(), Arc::clone(&client.session)))
            .collect()
    }

    /// Nicknames of every named client, ordered by id.
    pub(crate) fn named(&self) -> BTreeMap<u8, String> {
        self.clients
            .iter()
            .filter_map(|client| {
                client
                    .nickname
                    .clone()
                    .map(|nickname| (*client.key(), nickname))
            })
            .collect()
    }

    pub(crate) fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.clients.iter().map(|client| *client.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn len(&self) -> usize { self.clients.len() }
}

/// Trim `requested`, fall back to `Guest{id}` when empty, cap the length and
/// append `_2`, `_3`, ... until `is_taken` rejects the candidate no longer.
pub(crate) fn normalize_nickname(
    requested: &str,
    id: u8,
    is_taken: impl Fn(&str) -> bool,
) -> String {
    let trimmed = requested.trim();
    let base = if trimmed.is_empty() {
        format!("Guest{id}")
    } else {
        truncate_chars(trimmed, MAX_NICKNAME_CHARS).to_owned()
    };
    if !is_taken(&base) {
        return base;
    }
    (2_u32..)
        .map(|n| {
            let suffix = format!("_{n}");
            let keep = MAX_NICKNAME_CHARS.saturating_sub(suffix.chars().count());
            format!("{}{suffix}", truncate_chars(&base, keep))
        })
        .find(|candidate| !is_taken(candidate))
        .unwrap_or(base)
}

fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(idx, _)| &s[..idx])
}
