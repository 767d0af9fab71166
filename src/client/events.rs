//! Application callbacks fired by [`LanClient`](super::LanClient).

use crate::{message::Message, session::SessionError};

/// Hooks for roster changes, connection health and incoming frames.
///
/// Every method has a no-op default. Callbacks run on the client's I/O tasks
/// and must not block.
pub trait ClientEvents: Send + Sync + 'static {
    /// The server assigned this client its id.
    fn on_connected(&self) {}

    /// `nickname` joined or was (re)confirmed, including this client's own.
    fn on_client_connect(&self, _nickname: &str) {}

    /// `nickname` left. Fires once for this client itself when its
    /// connection drops.
    fn on_client_disconnect(&self, _nickname: &str) {}

    /// The connection dropped and a reconnect is scheduled.
    fn on_lost_connection(&self) {}

    /// A scheduled reconnect is starting.
    fn on_reconnection_attempt(&self) {}

    /// A broadcast or unicast frame arrived from `from`.
    ///
    /// `from` is [`SERVER_NICKNAME`](super::SERVER_NICKNAME) for frames the
    /// server originated and `#<id>` for peers that have no nickname yet.
    fn on_receive(&self, _from: &str, _message: &Message) {}

    /// The session reported an error.
    fn on_error(&self, _error: &SessionError) {}
}

/// [`ClientEvents`] that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoClientEvents;

impl ClientEvents for NoClientEvents {}
