//! Cloneable handle for addressing connected clients.

use std::{collections::BTreeMap, fmt, sync::Arc};

use super::{ServerError, registry::Registry};
use crate::{
    message::{Message, SERVER_ID},
    tag::Tag,
};

/// Sends frames to clients of a running [`LanServer`](super::LanServer) and
/// inspects its roster.
///
/// Obtain one with [`LanServer::handle`](super::LanServer::handle); clones
/// share the same registry.
#[derive(Clone, Default)]
pub struct ServerHandle {
    registry: Arc<Registry>,
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("clients", &self.registry.len())
            .finish()
    }
}

impl ServerHandle {
    pub(crate) fn registry(&self) -> &Registry { &self.registry }

    /// Send `message` to every client as `SERVER_TO_ALL` from the server.
    ///
    /// Returns the number of clients that accepted it.
    pub fn send_to_all(&self, message: &Message) -> usize {
        let out = message.restamped(Tag::ServerToAll).with_from(SERVER_ID);
        self.broadcast(&out, None)
    }

    /// Send `message` to client `id` as `SERVER_TO_CLIENT` from the server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UnknownClient`] if no client holds `id`, or
    /// [`ServerError::SendRejected`] if its session refused the frame.
    pub fn send_to(&self, id: u8, message: &Message) -> Result<usize, ServerError> {
        let session = self
            .registry
            .session(id)
            .ok_or(ServerError::UnknownClient(id))?;
        let out = message
            .restamped(Tag::ServerToClient)
            .with_from(SERVER_ID)
            .with_to(id);
        match session.send_message(&out) {
            0 => Err(ServerError::SendRejected(id)),
            sent => Ok(sent),
        }
    }

    /// Disconnect client `id`. Returns `false` if it is unknown or already
    /// leaving.
    pub fn disconnect(&self, id: u8) -> bool {
        self.registry
            .session(id)
            .is_some_and(|session| session.disconnect())
    }

    /// Nicknames of named clients, ordered by id.
    #[must_use]
    pub fn roster(&self) -> BTreeMap<u8, String> { self.registry.named() }

    /// Nickname of client `id`, if it has asked for one.
    #[must_use]
    pub fn nickname(&self, id: u8) -> Option<String> { self.registry.nickname(id) }

    /// Ids of every admitted client, named or not.
    #[must_use]
    pub fn client_ids(&self) -> Vec<u8> { self.registry.ids() }

    /// Number of admitted clients.
    #[must_use]
    pub fn session_count(&self) -> usize { self.registry.len() }

    /// Queue `message` unchanged on every client except `except`.
    pub(crate) fn broadcast(&self, message: &Message, except: Option<u8>) -> usize {
        self.registry
            .sessions_except(except)
            .iter()
            .filter(|(_, session)| session.send_message(message) > 0)
            .count()
    }

    /// Disconnect every client.
    pub(crate) fn disconnect_all(&self) {
        for (_, session) in self.registry.sessions_except(None) {
            session.disconnect();
        }
    }
}
