//! Application callbacks for server-side roster and message events.

use std::net::SocketAddr;

use super::ServerHandle;
use crate::{message::Message, session::SessionError};

/// Hooks for the application hosting a [`LanServer`](super::LanServer).
///
/// Callbacks run on session tasks; keep them short. The [`ServerHandle`]
/// argument can be used to reply.
pub trait ServerEvents: Send + Sync + 'static {
    /// Client `id` was confirmed under `nickname`.
    fn on_client_connect(&self, _server: &ServerHandle, _id: u8, _nickname: &str) {}

    /// Client `id` left. `nickname` is `None` if it never asked for one.
    fn on_client_disconnect(&self, _server: &ServerHandle, _id: u8, _nickname: Option<&str>) {}

    /// Client `from` sent a `CLIENT_TO_SERVER` frame.
    fn on_receive(&self, _server: &ServerHandle, _from: u8, _message: &Message) {}

    /// A connection was refused because every client id is in use.
    fn on_rejected(&self, _server: &ServerHandle, _peer: Option<SocketAddr>) {}

    /// A session reported an error. `client` is `None` if it never got an id.
    fn on_error(&self, _server: &ServerHandle, _client: Option<u8>, _error: &SessionError) {}
}

/// [`ServerEvents`] that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEvents;

impl ServerEvents for NoEvents {}
