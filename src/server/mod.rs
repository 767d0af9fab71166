//! Tokio-based relay server.
//!
//! `LanServer` accepts TCP connections, gives each one a [`Session`] and a
//! small client id, and routes frames between clients by system tag:
//! broadcasts, unicasts, nickname negotiation and join/leave announcements.
//! The application observes the roster through [`ServerEvents`] and talks to
//! clients through a [`ServerHandle`].
//!
//! [`Session`]: crate::session::Session

use std::{fmt, sync::Arc};

use tokio::{net::TcpListener, sync::oneshot};

use crate::session::SessionConfig;

/// Relay server for `lanwire` clients.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. New servers start `Unbound` and must call
/// [`bind`](LanServer::bind) or [`bind_listener`](LanServer::bind_listener)
/// before running.
pub struct LanServer<S: ServerState = Unbound> {
    pub(crate) session_config: SessionConfig,
    pub(crate) backoff: BackoffConfig,
    pub(crate) events: Arc<dyn ServerEvents>,
    pub(crate) handle: ServerHandle,
    /// Single-use readiness notification, sent once the accept loop runs.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

impl<S: ServerState + fmt::Debug> fmt::Debug for LanServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanServer")
            .field("session_config", &self.session_config)
            .field("backoff", &self.backoff)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
mod connection;
mod dispatch;
pub mod error;
mod events;
mod handle;
pub(crate) mod registry;
mod runtime;

pub use error::ServerError;
pub use events::{NoEvents, ServerEvents};
pub use handle::ServerHandle;
pub use registry::MAX_NICKNAME_CHARS;
/// Re-exported configuration types for server backoff behavior.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
